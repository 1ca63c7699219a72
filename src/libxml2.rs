//! LibXML2 FFI wrapper
//!
//! Safe wrapper around the handful of libxml2 calls needed to check a catalog
//! document held in memory: parse it into a tree, optionally validate the tree
//! against a compiled XSD, and report every problem with its line number and
//! node path.
//!
//! ## Thread safety
//!
//! - **Initialization** happens exactly once behind a `std::sync::Once`.
//! - **Schema parsing** is not thread-safe in libxml2 and is serialized through a
//!   process-wide mutex. The mutex is only ever taken from blocking code.
//! - **Document parsing and validation** run fully in parallel. Each call owns its
//!   parser context, document and validation context; the compiled schema is
//!   shared read-only behind an `Arc`.
//!
//! All calls here are blocking and CPU bound. Async callers run them inside
//! `tokio::task::spawn_blocking`.

use std::ffi::CStr;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, Once};

use libc::{c_char, c_int, c_void};

use crate::error::{LibXml2Error, LibXml2Result};

/// Global initialization flag for libxml2
static LIBXML2_INIT: Once = Once::new();

/// Serializes `xmlSchemaParse`, which shares global parser state.
static SCHEMA_PARSE_LOCK: Mutex<()> = Mutex::new(());

/// `XML_PARSE_NOERROR`: keep libxml2 from printing to stderr
const XML_PARSE_NOERROR: c_int = 1 << 5;
/// `XML_PARSE_NOWARNING`
const XML_PARSE_NOWARNING: c_int = 1 << 6;
/// `XML_PARSE_NONET`: never fetch external resources
const XML_PARSE_NONET: c_int = 1 << 11;
/// `XML_PARSE_BIG_LINES`: report line numbers above 65535
const XML_PARSE_BIG_LINES: c_int = 1 << 22;

const DOCUMENT_PARSE_OPTIONS: c_int =
    XML_PARSE_NONET | XML_PARSE_BIG_LINES | XML_PARSE_NOERROR | XML_PARSE_NOWARNING;

/// `xmlErrorLevel` values
const XML_ERR_WARNING: c_int = 1;
const XML_ERR_FATAL: c_int = 3;

// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct xmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut xmlError)>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();
    pub fn xmlInitGlobals();

    pub static xmlFree: Option<unsafe extern "C" fn(mem: *mut c_void)>;

    // Document parsing
    pub fn xmlNewParserCtxt() -> *mut XmlParserCtxt;
    pub fn xmlFreeParserCtxt(ctxt: *mut XmlParserCtxt);
    pub fn xmlCtxtReadMemory(
        ctxt: *mut XmlParserCtxt,
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlCtxtGetLastError(ctxt: *mut c_void) -> *const xmlError;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlGetNodePath(node: *const c_void) -> *mut c_char;

    // Schema parsing
    pub fn xmlSchemaNewMemParserCtxt(
        buffer: *const c_char,
        size: c_int,
    ) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *const XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation
    pub fn xmlSchemaNewValidCtxt(schema: *const XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;
}

/// Severity of a reported problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    Warning,
    Error,
    Fatal,
}

impl IssueLevel {
    fn from_raw(level: c_int) -> Self {
        match level {
            XML_ERR_WARNING => IssueLevel::Warning,
            XML_ERR_FATAL => IssueLevel::Fatal,
            _ => IssueLevel::Error,
        }
    }
}

/// One problem reported by libxml2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlIssue {
    pub message: String,
    pub line: Option<usize>,
    /// XPath-like locator of the offending node, e.g. `/BMECAT/HEADER`
    pub path: Option<String>,
    pub level: IssueLevel,
}

impl XmlIssue {
    pub fn is_warning(&self) -> bool {
        self.level == IssueLevel::Warning
    }

    /// Safety: `error` must be null or point to a live libxml2 error.
    unsafe fn from_raw(error: *const xmlError) -> Option<Self> {
        if error.is_null() {
            return None;
        }
        let error = unsafe { &*error };

        let message = if error.message.is_null() {
            format!("libxml2 error code {}", error.code)
        } else {
            unsafe { CStr::from_ptr(error.message) }
                .to_string_lossy()
                .trim()
                .to_string()
        };

        Some(XmlIssue {
            message,
            line: usize::try_from(error.line).ok().filter(|line| *line > 0),
            path: unsafe { node_path(error.node) },
            level: IssueLevel::from_raw(error.level),
        })
    }
}

/// Safety: `node` must be null or a live `xmlNodePtr`.
unsafe fn node_path(node: *mut c_void) -> Option<String> {
    if node.is_null() {
        return None;
    }
    let raw = unsafe { xmlGetNodePath(node) };
    if raw.is_null() {
        return None;
    }
    let path = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
    if let Some(free) = unsafe { xmlFree } {
        unsafe { free(raw as *mut c_void) };
    }
    Some(path)
}

/// Callback for libxml2 to report problems (structured)
unsafe extern "C" fn structured_error_callback(user_data: *mut c_void, error: *mut xmlError) {
    let issues = unsafe { &mut *(user_data as *mut Vec<XmlIssue>) };
    if let Some(issue) = unsafe { XmlIssue::from_raw(error) } {
        issues.push(issue);
    }
}

/// Thread-safe wrapper for a compiled libxml2 schema
#[derive(Debug)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: compiled xmlSchema structures are read-only once parsed
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// The pointer must come from `xmlSchemaParse` and must not be freed elsewhere.
    pub(crate) unsafe fn from_raw(ptr: *mut XmlSchema) -> LibXml2Result<Self> {
        if ptr.is_null() {
            return Err(LibXml2Error::SchemaParseFailed);
        }

        Ok(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *const XmlSchema {
        self.inner.ptr
    }

    pub fn is_valid(&self) -> bool {
        !self.inner.ptr.is_null()
    }
}

impl Clone for XmlSchemaPtr {
    fn clone(&self) -> Self {
        XmlSchemaPtr {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Owned parsed document, freed on drop
struct XmlDocument {
    ptr: *mut XmlDoc,
}

impl Drop for XmlDocument {
    fn drop(&mut self) {
        unsafe { xmlFreeDoc(self.ptr) };
    }
}

/// Outcome of checking one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentCheck {
    /// Well-formed and schema-valid; `warnings` may still be non-empty
    Valid { warnings: Vec<XmlIssue> },
    /// Well-formed but violates the schema; `issues` holds errors and warnings
    Invalid { error_count: i32, issues: Vec<XmlIssue> },
    /// Not well-formed XML; the tokenizer stopped at `issue`
    Malformed(XmlIssue),
    /// libxml2 failed internally while validating
    InternalError { code: i32 },
}

impl DocumentCheck {
    /// Create a check result from the libxml2 validation return code
    pub fn from_code(code: c_int, issues: Vec<XmlIssue>) -> Self {
        match code {
            0 => DocumentCheck::Valid { warnings: issues },
            n if n > 0 => DocumentCheck::Invalid {
                error_count: n,
                issues,
            },
            n => DocumentCheck::InternalError { code: n },
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, DocumentCheck::Valid { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, DocumentCheck::Malformed(_))
    }
}

/// Entry point for all libxml2 work
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Initializes libxml2 on first use; later calls are free.
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
            xmlInitGlobals();
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Compile an XSD held in memory.
    ///
    /// Serialized process-wide. Parser diagnostics are logged at debug level and
    /// folded into `SchemaParseFailed`.
    pub fn parse_schema_from_memory(&self, schema_data: &[u8]) -> LibXml2Result<XmlSchemaPtr> {
        let size = c_int::try_from(schema_data.len()).map_err(|_| {
            LibXml2Error::DocumentTooLarge {
                size: schema_data.len(),
            }
        })?;

        let _guard = SCHEMA_PARSE_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut issues: Vec<XmlIssue> = Vec::new();
        let schema_ptr = unsafe {
            let parser_ctxt = xmlSchemaNewMemParserCtxt(schema_data.as_ptr() as *const c_char, size);
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }

            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(structured_error_callback),
                &mut issues as *mut Vec<XmlIssue> as *mut c_void,
            );

            let schema_ptr = xmlSchemaParse(parser_ctxt);
            xmlSchemaFreeParserCtxt(parser_ctxt);
            schema_ptr
        };

        for issue in &issues {
            tracing::debug!(line = ?issue.line, "schema parser: {}", issue.message);
        }

        unsafe { XmlSchemaPtr::from_raw(schema_ptr) }
    }

    /// Parse `content` and, when a schema is given, validate it.
    ///
    /// The content is always treated as UTF-8 regardless of its XML declaration,
    /// since callers hand over already-decoded text. External entities and DTDs
    /// are never fetched.
    pub fn check_document(
        &self,
        schema: Option<&XmlSchemaPtr>,
        content: &[u8],
    ) -> LibXml2Result<DocumentCheck> {
        let size = c_int::try_from(content.len())
            .map_err(|_| LibXml2Error::DocumentTooLarge { size: content.len() })?;

        let document = match self.read_document(content, size)? {
            Ok(document) => document,
            Err(issue) => return Ok(DocumentCheck::Malformed(issue)),
        };

        let Some(schema) = schema else {
            return Ok(DocumentCheck::Valid {
                warnings: Vec::new(),
            });
        };

        unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut issues: Vec<XmlIssue> = Vec::new();
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(structured_error_callback),
                &mut issues as *mut Vec<XmlIssue> as *mut c_void,
            );

            // node paths are resolved inside the callback while the tree is alive
            let result_code = xmlSchemaValidateDoc(valid_ctxt, document.ptr);
            xmlSchemaFreeValidCtxt(valid_ctxt);

            Ok(DocumentCheck::from_code(result_code, issues))
        }
    }

    /// Outer error is a libxml2 failure; inner error is a well-formedness problem.
    fn read_document(
        &self,
        content: &[u8],
        size: c_int,
    ) -> LibXml2Result<std::result::Result<XmlDocument, XmlIssue>> {
        unsafe {
            let parser_ctxt = xmlNewParserCtxt();
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::MemoryAllocation);
            }

            let doc = xmlCtxtReadMemory(
                parser_ctxt,
                content.as_ptr() as *const c_char,
                size,
                std::ptr::null(),
                c"UTF-8".as_ptr(),
                DOCUMENT_PARSE_OPTIONS,
            );

            let outcome = if doc.is_null() {
                let issue = XmlIssue::from_raw(xmlCtxtGetLastError(parser_ctxt as *mut c_void))
                    .unwrap_or_else(|| XmlIssue {
                        message: "Document is not well-formed".to_string(),
                        line: None,
                        path: None,
                        level: IssueLevel::Fatal,
                    });
                Err(issue)
            } else {
                Ok(XmlDocument { ptr: doc })
            };

            xmlFreeParserCtxt(parser_ctxt);
            Ok(outcome)
        }
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
