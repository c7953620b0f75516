//! libxml2 FFI binding: the schema validation engine.
//!
//! ## Thread safety
//!
//! libxml2 schema *parsing* is not thread-safe, so every compilation runs
//! under [`COMPILE_LOCK`]. A compiled `xmlSchema` is read-only afterwards
//! and validation is safe from many threads as long as each call owns its
//! own validation context and document, which is what
//! [`LibXml2Schema::iter_errors`] does.
//!
//! ## Diagnostic mapping
//!
//! libxml2 reports errors through a structured callback carrying an error
//! code, a message and the offending node. The mapping into
//! [`RawValidationError`] keys on the code plus the two fixed phrases
//! libxml2 uses for unexpected and missing children.

use std::borrow::Cow;
use std::cell::Cell;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Arc, Mutex, Once, OnceLock};

use libc::{c_char, c_int, c_void};
use regex::Regex;
use tracing::{debug, warn};

use crate::engine::{CompiledSchema, RawErrorKind, RawValidationError, ValidationMode};
use crate::error::{Error, LibXml2Error, LibXml2Result, Result};
use crate::schema_tree::XmlSyntaxError;

static LIBXML2_INIT: Once = Once::new();

/// Serializes schema compilation.
static COMPILE_LOCK: Mutex<()> = Mutex::new(());

/// `XML_SCHEMAV_ELEMENT_CONTENT`
pub const CODE_ELEMENT_CONTENT: i32 = 1871;
/// `XML_SCHEMAV_CVC_ELT_1`: no matching global declaration for the root.
pub const CODE_NO_GLOBAL_DECLARATION: i32 = 1845;
/// `XML_SCHEMAV_CVC_DATATYPE_VALID_1_2_1` .. `_1_2_3`
pub const CODE_DATATYPE_RANGE: std::ops::RangeInclusive<i32> = 1824..=1826;

const XML_ERR_WARNING: c_int = 1;

const XML_PARSE_NOERROR: c_int = 1 << 5;
const XML_PARSE_NOWARNING: c_int = 1 << 6;
const XML_PARSE_NONET: c_int = 1 << 11;

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
pub struct XmlDoc {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlError {
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
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *mut XmlError)>;

pub type XmlFreeFunc = Option<unsafe extern "C" fn(mem: *mut c_void)>;

/// Declared variadic in C; the discarding handler never reads its arguments.
pub type XmlGenericErrorFunc = Option<unsafe extern "C" fn(ctx: *mut c_void, msg: *const c_char)>;

#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub static xmlFree: XmlFreeFunc;

    pub fn xmlInitParser();

    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaNewMemParserCtxt(buffer: *const c_char, size: c_int)
    -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *mut XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    pub fn xmlSchemaNewValidCtxt(schema: *mut XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateDoc(ctxt: *mut XmlSchemaValidCtxt, doc: *mut XmlDoc) -> c_int;

    pub fn xmlReadMemory(
        buffer: *const c_char,
        size: c_int,
        url: *const c_char,
        encoding: *const c_char,
        options: c_int,
    ) -> *mut XmlDoc;
    pub fn xmlFreeDoc(doc: *mut XmlDoc);
    pub fn xmlGetNodePath(node: *const c_void) -> *mut c_char;
    pub fn xmlDocDumpMemoryEnc(
        doc: *mut XmlDoc,
        mem: *mut *mut c_char,
        size: *mut c_int,
        encoding: *const c_char,
    );

    pub fn xmlGetLastError() -> *const XmlError;
    pub fn xmlResetLastError();
    pub fn xmlSetGenericErrorFunc(ctx: *mut c_void, handler: XmlGenericErrorFunc);
    pub fn xmlThrDefSetGenericErrorFunc(ctx: *mut c_void, handler: XmlGenericErrorFunc);
}

/// Swallows libxml2's unstructured messages (such as include/import I/O
/// warnings) so nothing reaches stderr behind tracing's back.
unsafe extern "C" fn discard_generic_error(_ctx: *mut c_void, _msg: *const c_char) {}

thread_local! {
    static GENERIC_ERRORS_DISCARDED: Cell<bool> = const { Cell::new(false) };
}

/// The generic handler is per thread in threaded libxml2 builds: set the
/// default for new threads once, and the current thread's on first use.
fn init() {
    LIBXML2_INIT.call_once(|| unsafe {
        xmlInitParser();
        xmlThrDefSetGenericErrorFunc(std::ptr::null_mut(), Some(discard_generic_error));
    });
    GENERIC_ERRORS_DISCARDED.with(|done| {
        if !done.replace(true) {
            unsafe { xmlSetGenericErrorFunc(std::ptr::null_mut(), Some(discard_generic_error)) };
        }
    });
}

/// One diagnostic as libxml2 delivered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Diagnostic {
    pub code: i32,
    pub level: i32,
    pub message: String,
    pub line: Option<u32>,
    pub path: Option<String>,
}

impl Diagnostic {
    fn is_warning(&self) -> bool {
        self.level == XML_ERR_WARNING
    }
}

/// Structured error sink; `user_data` is a `*mut Vec<Diagnostic>`.
unsafe extern "C" fn collect_diagnostic(user_data: *mut c_void, error: *mut XmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let sink = unsafe { &mut *(user_data as *mut Vec<Diagnostic>) };
    let error = unsafe { &*error };

    let message = if error.message.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(error.message) }
            .to_string_lossy()
            .trim()
            .to_string()
    };
    let path = if error.node.is_null() {
        None
    } else {
        unsafe { node_path(error.node) }
    };

    sink.push(Diagnostic {
        code: error.code,
        level: error.level,
        message,
        line: u32::try_from(error.line).ok().filter(|&line| line > 0),
        path,
    });
}

/// # Safety
///
/// `node` must point to a live `xmlNode`.
unsafe fn node_path(node: *const c_void) -> Option<String> {
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

fn element_name_regex() -> &'static Regex {
    static ELEMENT_NAME: OnceLock<Regex> = OnceLock::new();
    ELEMENT_NAME.get_or_init(|| {
        Regex::new(r"^Element '([^']+)'").expect("Failed to compile element name regex")
    })
}

const UNEXPECTED_ELEMENT: &str = "This element is not expected";
const MISSING_CHILD: &str = "Missing child element(s)";

/// Map one libxml2 validation diagnostic onto the engine contract.
pub(crate) fn to_raw_error(diagnostic: &Diagnostic) -> RawValidationError {
    let element = element_name_regex()
        .captures(&diagnostic.message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let unexpected = diagnostic.message.contains(UNEXPECTED_ELEMENT);
    let missing = diagnostic.message.contains(MISSING_CHILD);

    let (kind, reason) = if diagnostic.code == CODE_NO_GLOBAL_DECLARATION || unexpected {
        (
            RawErrorKind::Children {
                invalid_tag: element,
            },
            diagnostic.message.clone(),
        )
    } else if missing {
        let reason = format!(
            "The content of element '{}' is not complete. {}",
            element.as_deref().unwrap_or("unknown"),
            diagnostic.message
        );
        (RawErrorKind::Children { invalid_tag: None }, reason)
    } else if diagnostic.code == CODE_ELEMENT_CONTENT {
        (
            RawErrorKind::Children { invalid_tag: None },
            diagnostic.message.clone(),
        )
    } else if CODE_DATATYPE_RANGE.contains(&diagnostic.code) {
        (RawErrorKind::Decode, diagnostic.message.clone())
    } else {
        (RawErrorKind::Generic, diagnostic.message.clone())
    };

    let mut raw = RawValidationError::new(kind).with_code(diagnostic.code);
    if !reason.is_empty() {
        raw = raw.with_reason(reason);
    }
    if let Some(path) = &diagnostic.path {
        raw = raw.with_path(path.clone());
    }
    if let Some(line) = diagnostic.line {
        raw = raw.with_line(line);
    }
    raw
}

/// Owning handle to a compiled `xmlSchema`.
#[derive(Debug)]
struct SchemaHandle {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: a compiled xmlSchema is never written to after xmlSchemaParse
// returns; validation only reads it through per-call contexts.
unsafe impl Send for SchemaHandle {}
unsafe impl Sync for SchemaHandle {}

impl Drop for SchemaHandle {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { xmlSchemaFree(self.ptr) };
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// A schema compiled by libxml2. Cloning shares the compiled schema.
#[derive(Debug, Clone)]
pub struct LibXml2Schema {
    handle: Arc<SchemaHandle>,
    name: String,
}

impl LibXml2Schema {
    /// Compile the schema file at `path`. Relative `include`/`import`
    /// locations resolve against the file's directory.
    pub fn compile(path: &Path, mode: ValidationMode) -> Result<Self> {
        let name = path.display().to_string();
        let c_path = path
            .to_str()
            .and_then(|s| CString::new(s).ok())
            .ok_or_else(|| LibXml2Error::InvalidPath {
                path: path.to_path_buf(),
            })?;

        init();
        let ctxt = unsafe { xmlSchemaNewParserCtxt(c_path.as_ptr()) };
        Self::compile_with(ctxt, name, mode)
    }

    /// Compile schema text held in memory. Relative references resolve
    /// against the working directory.
    pub fn compile_memory(schema: &[u8], name: &str, mode: ValidationMode) -> Result<Self> {
        let size = c_int::try_from(schema.len()).map_err(|_| Error::SchemaLoad {
            schema: name.to_string(),
            details: "schema too large".to_string(),
        })?;

        init();
        let ctxt = unsafe { xmlSchemaNewMemParserCtxt(schema.as_ptr() as *const c_char, size) };
        Self::compile_with(ctxt, name.to_string(), mode)
    }

    fn compile_with(
        ctxt: *mut XmlSchemaParserCtxt,
        name: String,
        mode: ValidationMode,
    ) -> Result<Self> {
        if ctxt.is_null() {
            return Err(LibXml2Error::ParserContextCreationFailed.into());
        }

        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let ptr = {
            let _guard = COMPILE_LOCK
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Safety: ctxt is non-null and freed exactly once below; the
            // diagnostics vector outlives the parse call.
            unsafe {
                xmlSchemaSetParserStructuredErrors(
                    ctxt,
                    Some(collect_diagnostic),
                    &mut diagnostics as *mut Vec<Diagnostic> as *mut c_void,
                );
                let ptr = xmlSchemaParse(ctxt);
                xmlSchemaFreeParserCtxt(ctxt);
                ptr
            }
        };

        let handle = SchemaHandle {
            ptr,
            _phantom: PhantomData,
        };

        let (warnings, errors): (Vec<_>, Vec<_>) =
            diagnostics.into_iter().partition(Diagnostic::is_warning);

        if handle.ptr.is_null() || !errors.is_empty() {
            let details = if errors.is_empty() {
                LibXml2Error::SchemaCompileFailed {
                    details: "xmlSchemaParse returned no schema".to_string(),
                }
                .to_string()
            } else {
                join_messages(&errors)
            };
            return Err(Error::SchemaLoad {
                schema: name,
                details,
            });
        }

        match mode {
            ValidationMode::Strict if !warnings.is_empty() => {
                return Err(Error::SchemaLoad {
                    schema: name,
                    details: join_messages(&warnings),
                });
            }
            ValidationMode::Lax => {
                for warning in &warnings {
                    warn!(schema = %name, code = warning.code, "{}", warning.message);
                }
            }
            _ => {}
        }

        debug!(schema = %name, %mode, warnings = warnings.len(), "schema compiled");
        Ok(Self {
            handle: Arc::new(handle),
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn validate_doc(&self, document: &[u8], name: &str) -> LibXml2Result<Vec<Diagnostic>> {
        let size = c_int::try_from(document.len()).map_err(|_| LibXml2Error::DocumentLoadFailed {
            name: name.to_string(),
        })?;
        let c_name = CString::new(name).map_err(|_| LibXml2Error::DocumentLoadFailed {
            name: name.to_string(),
        })?;

        init();
        // Safety: every pointer created here is freed before returning, and
        // the diagnostics vector outlives the validation call.
        unsafe {
            let doc = xmlReadMemory(
                document.as_ptr() as *const c_char,
                size,
                c_name.as_ptr(),
                std::ptr::null(),
                XML_PARSE_NONET | XML_PARSE_NOERROR | XML_PARSE_NOWARNING,
            );
            if doc.is_null() {
                return Err(LibXml2Error::DocumentLoadFailed {
                    name: name.to_string(),
                });
            }

            let valid_ctxt = xmlSchemaNewValidCtxt(self.handle.ptr);
            if valid_ctxt.is_null() {
                xmlFreeDoc(doc);
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            let mut diagnostics: Vec<Diagnostic> = Vec::new();
            xmlSchemaSetValidStructuredErrors(
                valid_ctxt,
                Some(collect_diagnostic),
                &mut diagnostics as *mut Vec<Diagnostic> as *mut c_void,
            );

            let code = xmlSchemaValidateDoc(valid_ctxt, doc);

            xmlSchemaFreeValidCtxt(valid_ctxt);
            xmlFreeDoc(doc);

            if code < 0 {
                return Err(LibXml2Error::InternalError {
                    code,
                    name: name.to_string(),
                });
            }
            Ok(diagnostics)
        }
    }
}

impl CompiledSchema for LibXml2Schema {
    fn iter_errors(&self, document: &[u8], name: &str) -> Result<Vec<RawValidationError>> {
        let diagnostics = self.validate_doc(document, name)?;
        let errors: Vec<RawValidationError> = diagnostics
            .iter()
            .filter(|d| !d.is_warning())
            .map(to_raw_error)
            .collect();
        debug!(schema = %self.name, document = name, errors = errors.len(), "instance validated");
        Ok(errors)
    }
}

fn join_messages(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn encoding_declaration_regex() -> &'static regex::bytes::Regex {
    static ENCODING_DECL: OnceLock<regex::bytes::Regex> = OnceLock::new();
    ENCODING_DECL.get_or_init(|| {
        regex::bytes::Regex::new(r#"^<\?xml[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
            .expect("Failed to compile encoding declaration regex")
    })
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Encoding named in the XML declaration, if any.
pub(crate) fn declared_encoding(document: &[u8]) -> Option<String> {
    let document = document.strip_prefix(UTF8_BOM).unwrap_or(document);
    encoding_declaration_regex()
        .captures(document)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).to_ascii_lowercase())
}

/// UTF-8 text of an XML document for tree parsing. Documents that are UTF-8
/// (or declare no other encoding and decode as UTF-8) are borrowed as-is;
/// anything else is decoded by libxml2 according to its declaration or BOM
/// and re-serialized as UTF-8.
pub(crate) fn decode_document(
    document: &[u8],
) -> std::result::Result<Cow<'_, str>, XmlSyntaxError> {
    let utf8_declared = declared_encoding(document).is_none_or(|encoding| {
        matches!(encoding.as_str(), "utf-8" | "utf8" | "us-ascii" | "ascii")
    });
    if utf8_declared {
        if let Ok(text) = std::str::from_utf8(document) {
            return Ok(Cow::Borrowed(text));
        }
    }
    transcode_to_utf8(document).map(Cow::Owned)
}

fn transcode_to_utf8(document: &[u8]) -> std::result::Result<String, XmlSyntaxError> {
    let size = c_int::try_from(document.len()).map_err(|_| XmlSyntaxError {
        line: 0,
        column: 0,
        details: "document too large".to_string(),
    })?;

    init();
    // Safety: the document and the dump buffer are freed before returning;
    // the last-error record is read on the thread that produced it.
    unsafe {
        xmlResetLastError();
        let doc = xmlReadMemory(
            document.as_ptr() as *const c_char,
            size,
            std::ptr::null(),
            std::ptr::null(),
            XML_PARSE_NONET | XML_PARSE_NOERROR | XML_PARSE_NOWARNING,
        );
        if doc.is_null() {
            return Err(last_syntax_error());
        }

        let mut mem: *mut c_char = std::ptr::null_mut();
        let mut len: c_int = 0;
        xmlDocDumpMemoryEnc(doc, &mut mem, &mut len, c"UTF-8".as_ptr());
        xmlFreeDoc(doc);

        if mem.is_null() {
            return Err(XmlSyntaxError {
                line: 0,
                column: 0,
                details: "libxml2 could not re-encode the document as UTF-8".to_string(),
            });
        }
        let bytes =
            std::slice::from_raw_parts(mem as *const u8, usize::try_from(len).unwrap_or(0));
        let text = String::from_utf8_lossy(bytes).into_owned();
        if let Some(free) = xmlFree {
            free(mem as *mut c_void);
        }
        Ok(text)
    }
}

/// # Safety
///
/// Must run on the thread whose parse just failed.
unsafe fn last_syntax_error() -> XmlSyntaxError {
    let error = unsafe { xmlGetLastError() };
    if error.is_null() {
        return XmlSyntaxError {
            line: 0,
            column: 0,
            details: "document is not well-formed XML".to_string(),
        };
    }
    let error = unsafe { &*error };
    let details = if error.message.is_null() {
        "document is not well-formed XML".to_string()
    } else {
        unsafe { CStr::from_ptr(error.message) }
            .to_string_lossy()
            .trim()
            .to_string()
    };
    XmlSyntaxError {
        line: u32::try_from(error.line).unwrap_or(0),
        column: u32::try_from(error.int2).unwrap_or(0),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE_XSD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:element name="root">
        <xs:complexType>
            <xs:sequence>
                <xs:element name="name" type="xs:string"/>
                <xs:element name="count" type="xs:integer"/>
            </xs:sequence>
        </xs:complexType>
    </xs:element>
</xs:schema>"#;

    fn diagnostic(code: i32, message: &str) -> Diagnostic {
        Diagnostic {
            code,
            level: 2,
            message: message.to_string(),
            line: Some(4),
            path: Some("/root/extra".to_string()),
        }
    }

    fn compile() -> LibXml2Schema {
        LibXml2Schema::compile_memory(SIMPLE_XSD.as_bytes(), "simple.xsd", ValidationMode::Lax)
            .unwrap()
    }

    #[test]
    fn test_unexpected_element_maps_to_children_with_tag() {
        let raw = to_raw_error(&diagnostic(
            CODE_ELEMENT_CONTENT,
            "Element 'extra': This element is not expected. Expected is ( count ).",
        ));
        assert_eq!(
            raw.kind,
            RawErrorKind::Children {
                invalid_tag: Some("extra".to_string())
            }
        );
        assert_eq!(raw.path.as_deref(), Some("/root/extra"));
        assert_eq!(raw.line, Some(4));
        assert_eq!(raw.code, Some(CODE_ELEMENT_CONTENT));
    }

    #[test]
    fn test_missing_child_is_rendered_incomplete() {
        let raw = to_raw_error(&diagnostic(
            CODE_ELEMENT_CONTENT,
            "Element 'root': Missing child element(s). Expected is ( count ).",
        ));
        assert_eq!(raw.kind, RawErrorKind::Children { invalid_tag: None });
        let reason = raw.reason.unwrap();
        assert!(reason.starts_with("The content of element 'root' is not complete."));
        assert!(reason.contains("Missing child element(s)"));
    }

    #[test]
    fn test_undeclared_root_carries_tag() {
        let raw = to_raw_error(&diagnostic(
            CODE_NO_GLOBAL_DECLARATION,
            "Element '{urn:x}other': No matching global declaration available for the validation root.",
        ));
        assert_eq!(raw.kind.invalid_tag(), Some("{urn:x}other"));
    }

    #[test]
    fn test_datatype_errors_map_to_decode() {
        for code in CODE_DATATYPE_RANGE {
            let raw = to_raw_error(&diagnostic(
                code,
                "Element 'count': 'abc' is not a valid value of the atomic type 'xs:integer'.",
            ));
            assert_eq!(raw.kind, RawErrorKind::Decode);
        }
    }

    #[test]
    fn test_unknown_code_maps_to_generic() {
        let raw = to_raw_error(&diagnostic(1840, "Element 'name': [facet 'pattern'] mismatch."));
        assert_eq!(raw.kind, RawErrorKind::Generic);
        assert_eq!(raw.kind.name(), "ValidationError");
    }

    #[test]
    fn test_empty_message_leaves_reason_absent() {
        let raw = to_raw_error(&diagnostic(1840, ""));
        assert_eq!(raw.reason, None);
    }

    #[test]
    fn test_compile_and_validate_clean_document() {
        let schema = compile();
        let errors = schema
            .iter_errors(b"<root><name>a</name><count>3</count></root>", "ok.xml")
            .unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_validate_reports_content_and_type_errors() {
        let schema = compile();

        let errors = schema
            .iter_errors(
                b"<root><name>a</name><extra/><count>3</count></root>",
                "extra.xml",
            )
            .unwrap();
        assert!(!errors.is_empty());
        assert_eq!(errors[0].kind.invalid_tag(), Some("extra"));

        let errors = schema
            .iter_errors(b"<root><name>a</name><count>x</count></root>", "type.xml")
            .unwrap();
        assert!(errors.iter().any(|e| e.kind == RawErrorKind::Decode));
        assert!(errors.iter().all(|e| e.path.is_some()));
    }

    #[test]
    fn test_compile_rejects_broken_schema() {
        let result = LibXml2Schema::compile_memory(
            br#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"><xs:element name="a" type="nope"/></xs:schema>"#,
            "broken.xsd",
            ValidationMode::Skip,
        );
        match result {
            Err(Error::SchemaLoad { schema, .. }) => assert_eq!(schema, "broken.xsd"),
            other => panic!("Expected SchemaLoad, got {:?}", other.map(|s| s.name().to_string())),
        }
    }

    const LATIN1_DOC: &[u8] =
        b"<?xml version='1.0' encoding='ISO-8859-1'?>\n<root><name>Caf\xE9</name><count>1</count></root>";

    #[test]
    fn test_declared_encoding() {
        assert_eq!(declared_encoding(LATIN1_DOC).as_deref(), Some("iso-8859-1"));
        assert_eq!(
            declared_encoding(b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>").as_deref(),
            Some("utf-8")
        );
        assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><a encoding='x'/>"), None);
        assert_eq!(declared_encoding(b"<a/>"), None);
    }

    #[test]
    fn test_utf8_documents_are_borrowed() {
        let doc = "<?xml version=\"1.0\" encoding=\"utf-8\"?><a>caf\u{e9}</a>";
        assert!(matches!(decode_document(doc.as_bytes()), Ok(Cow::Borrowed(text)) if text == doc));
    }

    #[test]
    fn test_latin1_document_is_transcoded() {
        let text = decode_document(LATIN1_DOC).unwrap();
        assert!(matches!(text, Cow::Owned(_)));
        assert!(text.contains("<name>Caf\u{e9}</name>"));
    }

    #[test]
    fn test_malformed_latin1_reports_position() {
        let error = decode_document(b"<?xml version='1.0' encoding='ISO-8859-1'?>\n<root>\xE9<root>")
            .unwrap_err();
        assert_eq!(error.line, 2);
        assert!(!error.details.is_empty());
    }

    #[test]
    fn test_latin1_bytes_reach_the_engine_untouched() {
        let errors = compile().iter_errors(LATIN1_DOC, "latin1.xml").unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_missing_include_is_a_schema_error() {
        let xsd = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
    <xs:include schemaLocation="/nonexistent/dir/missing.xsd"/>
    <xs:element name="root" type="xs:string"/>
</xs:schema>"#;
        let compiled =
            LibXml2Schema::compile_memory(xsd.as_bytes(), "include.xsd", ValidationMode::Strict);
        assert!(compiled.is_err());
    }

    #[test]
    fn test_shared_schema_across_threads() {
        use rayon::prelude::*;

        let schema = compile();
        let counts: Vec<usize> = (0..16)
            .into_par_iter()
            .map(|i| {
                let doc = if i % 2 == 0 {
                    "<root><name>a</name><count>1</count></root>"
                } else {
                    "<root><name>a</name><count>bad</count></root>"
                };
                schema.iter_errors(doc.as_bytes(), "par.xml").unwrap().len()
            })
            .collect();

        for (i, count) in counts.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(*count, 0);
            } else {
                assert!(*count > 0);
            }
        }
    }
}
