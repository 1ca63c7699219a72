//! Typed BMEcat document model
//!
//! One set of structs reads both dialects: fields carry the 1.2 element name
//! and accept the 2005 name as an alias. Elements the importer does not use are
//! skipped by the deserializer.

use serde::Deserialize;

use crate::adapter::non_blank;

/// Element text plus the optional `type` attribute
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypedText {
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(rename = "$text", default)]
    pub value: String,
}

impl TypedText {
    pub fn text(&self) -> Option<String> {
        non_blank(Some(&self.value))
    }
}

fn first_text(values: &[TypedText]) -> Option<String> {
    values.iter().find_map(TypedText::text)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BmecatDocument {
    #[serde(rename = "@version", default)]
    pub version: Option<String>,
    #[serde(rename = "HEADER", default)]
    pub header: Option<Header>,
    #[serde(rename = "T_NEW_CATALOG", default)]
    pub new_catalog: Option<NewCatalog>,
}

impl BmecatDocument {
    pub fn articles(&self) -> &[Article] {
        self.new_catalog
            .as_ref()
            .map(|catalog| catalog.articles.as_slice())
            .unwrap_or(&[])
    }

    pub fn catalog(&self) -> Option<&CatalogInfo> {
        self.header.as_ref().and_then(|h| h.catalog.as_ref())
    }

    pub fn catalog_id(&self) -> Option<String> {
        self.catalog().and_then(|c| non_blank(c.id.as_deref()))
    }

    pub fn catalog_version(&self) -> Option<String> {
        self.catalog().and_then(|c| non_blank(c.version.as_deref()))
    }

    pub fn catalog_name(&self) -> Option<String> {
        self.catalog().and_then(|c| first_text(&c.names))
    }

    pub fn language(&self) -> Option<String> {
        self.catalog().and_then(|c| first_text(&c.languages))
    }

    /// Catalog-wide currency stated in the header
    pub fn currency(&self) -> Option<String> {
        self.catalog()
            .and_then(|c| c.currency.as_ref())
            .and_then(TypedText::text)
    }

    /// Supplier id from `SUPPLIER/SUPPLIER_ID` or `SUPPLIER_IDREF`
    pub fn supplier_id(&self) -> Option<String> {
        let header = self.header.as_ref()?;
        header
            .supplier
            .as_ref()
            .and_then(|s| first_text(&s.ids))
            .or_else(|| header.supplier_idref.as_ref().and_then(TypedText::text))
    }

    pub fn supplier_name(&self) -> Option<String> {
        self.header
            .as_ref()
            .and_then(|h| h.supplier.as_ref())
            .and_then(|s| s.name.as_ref())
            .and_then(TypedText::text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    #[serde(rename = "GENERATOR_INFO", default)]
    pub generator_info: Option<String>,
    #[serde(rename = "CATALOG", default)]
    pub catalog: Option<CatalogInfo>,
    #[serde(rename = "SUPPLIER", default)]
    pub supplier: Option<Supplier>,
    #[serde(rename = "SUPPLIER_IDREF", default)]
    pub supplier_idref: Option<TypedText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogInfo {
    #[serde(rename = "LANGUAGE", default)]
    pub languages: Vec<TypedText>,
    #[serde(rename = "CATALOG_ID", default)]
    pub id: Option<String>,
    #[serde(rename = "CATALOG_VERSION", default)]
    pub version: Option<String>,
    #[serde(rename = "CATALOG_NAME", default)]
    pub names: Vec<TypedText>,
    #[serde(rename = "CURRENCY", default)]
    pub currency: Option<TypedText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Supplier {
    #[serde(rename = "SUPPLIER_ID", default)]
    pub ids: Vec<TypedText>,
    #[serde(rename = "SUPPLIER_NAME", default)]
    pub name: Option<TypedText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCatalog {
    #[serde(rename = "ARTICLE", alias = "PRODUCT", default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Article {
    #[serde(rename = "@mode", default)]
    pub mode: Option<String>,
    #[serde(rename = "SUPPLIER_AID", alias = "SUPPLIER_PID", default)]
    pub supplier_aid: Option<TypedText>,
    #[serde(rename = "ARTICLE_DETAILS", alias = "PRODUCT_DETAILS", default)]
    pub details: Option<ArticleDetails>,
    #[serde(rename = "ARTICLE_FEATURES", alias = "PRODUCT_FEATURES", default)]
    pub features: Vec<FeatureGroup>,
    #[serde(
        rename = "ARTICLE_PRICE_DETAILS",
        alias = "PRODUCT_PRICE_DETAILS",
        default
    )]
    pub price_details: Vec<PriceDetails>,
}

impl Article {
    /// Supplier-assigned article id
    pub fn supplier_aid(&self) -> Option<String> {
        self.supplier_aid.as_ref().and_then(TypedText::text)
    }

    /// Buyer-assigned article number
    pub fn article_number(&self) -> Option<String> {
        self.details.as_ref().and_then(|d| first_text(&d.buyer_aids))
    }

    pub fn short_description(&self) -> Option<String> {
        self.details
            .as_ref()
            .and_then(|d| first_text(&d.short_descriptions))
    }

    pub fn long_description(&self) -> Option<String> {
        self.details
            .as_ref()
            .and_then(|d| first_text(&d.long_descriptions))
    }

    /// Best identifier for diagnostics
    pub fn identifier(&self) -> String {
        self.article_number()
            .or_else(|| self.supplier_aid())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Every price block across all price-detail groups, in document order
    pub fn prices(&self) -> impl Iterator<Item = &Price> {
        self.price_details.iter().flat_map(|d| d.prices.iter())
    }

    /// Features across all feature groups, in document order
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().flat_map(|g| g.features.iter())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleDetails {
    #[serde(rename = "DESCRIPTION_SHORT", default)]
    pub short_descriptions: Vec<TypedText>,
    #[serde(rename = "DESCRIPTION_LONG", default)]
    pub long_descriptions: Vec<TypedText>,
    #[serde(rename = "EAN", alias = "INTERNATIONAL_PID", default)]
    pub international_ids: Vec<TypedText>,
    #[serde(rename = "BUYER_AID", alias = "BUYER_PID", default)]
    pub buyer_aids: Vec<TypedText>,
    #[serde(rename = "MANUFACTURER_AID", alias = "MANUFACTURER_PID", default)]
    pub manufacturer_aid: Option<TypedText>,
    #[serde(rename = "MANUFACTURER_NAME", default)]
    pub manufacturer_name: Option<TypedText>,
    #[serde(rename = "KEYWORD", default)]
    pub keywords: Vec<TypedText>,
    #[serde(rename = "REMARKS", default)]
    pub remarks: Vec<TypedText>,
}

impl ArticleDetails {
    /// EAN/GTIN; an untyped `INTERNATIONAL_PID` or 1.2 `EAN` counts too
    pub fn ean(&self) -> Option<String> {
        let is_ean = |id: &&TypedText| {
            id.kind
                .as_deref()
                .map(|kind| matches!(kind.to_ascii_lowercase().as_str(), "ean" | "gtin"))
                .unwrap_or(true)
        };
        self.international_ids
            .iter()
            .filter(is_ean)
            .find_map(TypedText::text)
    }

    pub fn manufacturer_part_number(&self) -> Option<String> {
        self.manufacturer_aid.as_ref().and_then(TypedText::text)
    }

    pub fn manufacturer_name(&self) -> Option<String> {
        self.manufacturer_name.as_ref().and_then(TypedText::text)
    }

    pub fn keywords(&self) -> Vec<String> {
        self.keywords.iter().filter_map(TypedText::text).collect()
    }

    pub fn remarks(&self) -> Option<String> {
        first_text(&self.remarks)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureGroup {
    #[serde(rename = "FEATURE", default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Feature {
    #[serde(rename = "FNAME", default)]
    pub names: Vec<TypedText>,
    #[serde(rename = "FVALUE", default)]
    pub values: Vec<TypedText>,
    #[serde(rename = "FUNIT", default)]
    pub unit: Option<TypedText>,
}

impl Feature {
    pub fn name(&self) -> Option<String> {
        first_text(&self.names)
    }

    /// All values joined with `", "`
    pub fn value(&self) -> String {
        self.values
            .iter()
            .filter_map(TypedText::text)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn unit(&self) -> Option<String> {
        self.unit.as_ref().and_then(TypedText::text)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceDetails {
    #[serde(rename = "ARTICLE_PRICE", alias = "PRODUCT_PRICE", default)]
    pub prices: Vec<Price>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Price {
    #[serde(rename = "@price_type", default)]
    pub price_type: Option<String>,
    #[serde(rename = "PRICE_AMOUNT", default)]
    pub amount: Option<String>,
    #[serde(rename = "PRICE_CURRENCY", default)]
    pub currency: Option<String>,
}

impl Price {
    /// `net_price` or `net_list`
    pub fn is_net(&self) -> bool {
        matches!(
            self.price_type.as_deref().map(str::trim),
            Some("net_price") | Some("net_list")
        )
    }
}

/// Deserialize a whole document. Blocking; call from `spawn_blocking`.
pub fn from_str(content: &str) -> Result<BmecatDocument, quick_xml::DeError> {
    quick_xml::de::from_str(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_1_2: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<BMECAT version="1.2">
  <HEADER>
    <CATALOG>
      <LANGUAGE>deu</LANGUAGE>
      <CATALOG_ID>CAT-1</CATALOG_ID>
      <CATALOG_VERSION>7.0</CATALOG_VERSION>
      <CATALOG_NAME>Tools</CATALOG_NAME>
      <CURRENCY>CHF</CURRENCY>
    </CATALOG>
    <SUPPLIER>
      <SUPPLIER_ID type="duns">SUP-12</SUPPLIER_ID>
      <SUPPLIER_NAME>Acme</SUPPLIER_NAME>
    </SUPPLIER>
  </HEADER>
  <T_NEW_CATALOG>
    <ARTICLE mode="new">
      <SUPPLIER_AID>A-100</SUPPLIER_AID>
      <ARTICLE_DETAILS>
        <DESCRIPTION_SHORT>Cordless drill</DESCRIPTION_SHORT>
        <DESCRIPTION_LONG>18V cordless drill</DESCRIPTION_LONG>
        <EAN>4006381333931</EAN>
        <BUYER_AID type="buyer_specific">B-7</BUYER_AID>
        <MANUFACTURER_AID>MPN-1</MANUFACTURER_AID>
        <MANUFACTURER_NAME>Bosch</MANUFACTURER_NAME>
        <KEYWORD>drill</KEYWORD>
        <KEYWORD>cordless</KEYWORD>
      </ARTICLE_DETAILS>
      <ARTICLE_FEATURES>
        <FEATURE>
          <FNAME>Voltage</FNAME>
          <FVALUE>18</FVALUE>
          <FUNIT>V</FUNIT>
        </FEATURE>
      </ARTICLE_FEATURES>
      <ARTICLE_PRICE_DETAILS>
        <ARTICLE_PRICE price_type="net_customer">
          <PRICE_AMOUNT>99.00</PRICE_AMOUNT>
        </ARTICLE_PRICE>
        <ARTICLE_PRICE price_type="net_list">
          <PRICE_AMOUNT>89.50</PRICE_AMOUNT>
          <PRICE_CURRENCY>EUR</PRICE_CURRENCY>
        </ARTICLE_PRICE>
      </ARTICLE_PRICE_DETAILS>
    </ARTICLE>
    <ARTICLE>
      <SUPPLIER_AID>A-101</SUPPLIER_AID>
    </ARTICLE>
  </T_NEW_CATALOG>
</BMECAT>"#;

    const CATALOG_2005: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<BMECAT version="2005.2">
  <HEADER>
    <CATALOG>
      <LANGUAGE default="true">eng</LANGUAGE>
      <CATALOG_ID>C-2005</CATALOG_ID>
      <CATALOG_VERSION>1.0</CATALOG_VERSION>
    </CATALOG>
    <SUPPLIER_IDREF>REF-9</SUPPLIER_IDREF>
  </HEADER>
  <T_NEW_CATALOG>
    <PRODUCT mode="new">
      <SUPPLIER_PID type="supplier_specific">P-1</SUPPLIER_PID>
      <PRODUCT_DETAILS>
        <DESCRIPTION_SHORT lang="eng">Hammer</DESCRIPTION_SHORT>
        <INTERNATIONAL_PID type="isbn">978-3</INTERNATIONAL_PID>
        <INTERNATIONAL_PID type="gtin">4001234567890</INTERNATIONAL_PID>
        <BUYER_PID type="buyer_specific">BP-1</BUYER_PID>
        <MANUFACTURER_PID>HM-2</MANUFACTURER_PID>
      </PRODUCT_DETAILS>
      <PRODUCT_PRICE_DETAILS>
        <PRODUCT_PRICE price_type="net_price">
          <PRICE_AMOUNT>12.5</PRICE_AMOUNT>
        </PRODUCT_PRICE>
      </PRODUCT_PRICE_DETAILS>
    </PRODUCT>
  </T_NEW_CATALOG>
</BMECAT>"#;

    #[test]
    fn test_deserialize_1_2_catalog() {
        let doc = from_str(CATALOG_1_2).unwrap();

        assert_eq!(doc.version.as_deref(), Some("1.2"));
        assert_eq!(doc.catalog_id().as_deref(), Some("CAT-1"));
        assert_eq!(doc.catalog_version().as_deref(), Some("7.0"));
        assert_eq!(doc.catalog_name().as_deref(), Some("Tools"));
        assert_eq!(doc.language().as_deref(), Some("deu"));
        assert_eq!(doc.currency().as_deref(), Some("CHF"));
        assert_eq!(doc.supplier_id().as_deref(), Some("SUP-12"));
        assert_eq!(doc.supplier_name().as_deref(), Some("Acme"));
        assert_eq!(doc.articles().len(), 2);

        let article = &doc.articles()[0];
        assert_eq!(article.mode.as_deref(), Some("new"));
        assert_eq!(article.supplier_aid().as_deref(), Some("A-100"));
        assert_eq!(article.article_number().as_deref(), Some("B-7"));
        assert_eq!(article.short_description().as_deref(), Some("Cordless drill"));

        let details = article.details.as_ref().unwrap();
        assert_eq!(details.ean().as_deref(), Some("4006381333931"));
        assert_eq!(details.manufacturer_part_number().as_deref(), Some("MPN-1"));
        assert_eq!(details.keywords(), vec!["drill", "cordless"]);

        let feature = article.features().next().unwrap();
        assert_eq!(feature.name().as_deref(), Some("Voltage"));
        assert_eq!(feature.value(), "18");
        assert_eq!(feature.unit().as_deref(), Some("V"));

        let prices: Vec<&Price> = article.prices().collect();
        assert_eq!(prices.len(), 2);
        assert!(!prices[0].is_net());
        assert!(prices[1].is_net());
    }

    #[test]
    fn test_deserialize_2005_catalog_with_aliases() {
        let doc = from_str(CATALOG_2005).unwrap();

        assert_eq!(doc.supplier_id().as_deref(), Some("REF-9"));
        assert_eq!(doc.language().as_deref(), Some("eng"));

        let article = &doc.articles()[0];
        assert_eq!(article.supplier_aid().as_deref(), Some("P-1"));
        assert_eq!(article.article_number().as_deref(), Some("BP-1"));
        assert_eq!(article.short_description().as_deref(), Some("Hammer"));

        let details = article.details.as_ref().unwrap();
        // the isbn-typed id is not an EAN
        assert_eq!(details.ean().as_deref(), Some("4001234567890"));
        assert_eq!(details.manufacturer_part_number().as_deref(), Some("HM-2"));

        let price = article.prices().next().unwrap();
        assert!(price.is_net());
        assert_eq!(price.amount.as_deref(), Some("12.5"));
    }

    #[test]
    fn test_headerless_document() {
        let doc = from_str(r#"<BMECAT version="2005"><T_NEW_CATALOG/></BMECAT>"#).unwrap();
        assert!(doc.header.is_none());
        assert!(doc.articles().is_empty());
        assert!(doc.supplier_id().is_none());
    }

    #[test]
    fn test_identifier_fallback() {
        let article = Article::default();
        assert_eq!(article.identifier(), "unknown");
    }
}
