//! HTML to Markdown conversion across the C ABI.
//!
//! Conversion never fails from the caller's point of view. If the library is
//! missing, rejects the input or returns null, the original HTML comes back
//! unchanged and the reason is logged.
//!
//! Ownership: every non-null pointer returned by `Convert` belongs to the
//! library and is handed back to `Free` exactly once, after the bytes have
//! been copied into a Rust `String`.

use std::ffi::{CStr, CString, NulError, c_char, c_int};
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};

use thiserror::Error;

use super::loader::{FreeFn, LibraryLoader, LoadError, NativeApi};

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Input contains an interior NUL byte: {0}")]
    InteriorNul(#[from] NulError),

    #[error("Too many elements to strip: {0}")]
    TooManyElements(usize),

    #[error("Native conversion returned null")]
    NullResult,

    #[error("Native conversion panicked")]
    Panicked,

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Buffer allocated by the native library.
///
/// Dropping it releases the buffer through the library's own `Free`.
struct NativeString {
    ptr: NonNull<c_char>,
    free: FreeFn,
}

impl NativeString {
    fn new(ptr: *mut c_char, free: FreeFn) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, free })
    }

    fn to_string_lossy(&self) -> String {
        // SAFETY: the library returns a NUL-terminated string that stays
        // valid until it is passed to `Free`, which only happens in `drop`.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

impl Drop for NativeString {
    fn drop(&mut self) {
        // SAFETY: the pointer came from `Convert` and has not been freed;
        // `drop` runs at most once.
        unsafe { (self.free)(self.ptr.as_ptr()) };
    }
}

/// Perform one native call with owned copies of every argument.
fn call_native<S: AsRef<str>>(
    api: NativeApi,
    html: &str,
    elements_to_strip: &[S],
) -> Result<String, ConversionError> {
    let html = CString::new(html)?;
    let elements = elements_to_strip
        .iter()
        .map(|e| CString::new(e.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let pointers: Vec<*const c_char> = elements.iter().map(|e| e.as_ptr()).collect();
    let len = c_int::try_from(pointers.len())
        .map_err(|_| ConversionError::TooManyElements(pointers.len()))?;
    let array = if pointers.is_empty() {
        ptr::null()
    } else {
        pointers.as_ptr()
    };

    // SAFETY: `html` and every entry of `pointers` are NUL-terminated and
    // outlive the call; `array` holds exactly `len` entries or is null with
    // `len == 0`.
    let raw = unsafe { (api.convert)(html.as_ptr(), array, len) };
    let buffer = NativeString::new(raw, api.free).ok_or(ConversionError::NullResult)?;
    Ok(buffer.to_string_lossy())
}

#[derive(Debug, Clone)]
enum ApiSource {
    Library(LibraryLoader),
    Direct(NativeApi),
}

/// Converts HTML documents through the native library.
///
/// Cheap to share: the library itself is opened once per process on the
/// first conversion.
#[derive(Debug, Clone)]
pub struct Converter {
    source: ApiSource,
}

impl Converter {
    /// Converter that loads the library through `loader` on first use.
    pub fn new(loader: LibraryLoader) -> Self {
        Self {
            source: ApiSource::Library(loader),
        }
    }

    /// Converter over already-bound entry points.
    pub fn from_api(api: NativeApi) -> Self {
        Self {
            source: ApiSource::Direct(api),
        }
    }

    /// Open the library now instead of on the first conversion.
    pub fn ensure_loaded(&self) -> Result<(), LoadError> {
        self.api().map(|_| ())
    }

    fn api(&self) -> Result<NativeApi, LoadError> {
        match &self.source {
            ApiSource::Library(loader) => loader.ensure_loaded().map(|handle| handle.api()),
            ApiSource::Direct(api) => Ok(*api),
        }
    }

    /// Convert `html`, surfacing the reason when conversion did not happen.
    ///
    /// Empty input returns an empty string without touching the library.
    pub fn try_convert<S: AsRef<str>>(
        &self,
        html: &str,
        elements_to_strip: &[S],
    ) -> Result<String, ConversionError> {
        if html.is_empty() {
            return Ok(String::new());
        }
        let api = self.api()?;
        // Only reachable in unwinding builds; release builds abort on panic.
        panic::catch_unwind(AssertUnwindSafe(|| call_native(api, html, elements_to_strip)))
            .unwrap_or(Err(ConversionError::Panicked))
    }

    /// Convert `html` to Markdown, returning the input unchanged on failure.
    ///
    /// `elements_to_strip` is applied on top of the library's built-in set
    /// (scripts, styles, navigation chrome and the like).
    pub fn convert<S: AsRef<str>>(&self, html: &str, elements_to_strip: &[S]) -> String {
        match self.try_convert(html, elements_to_strip) {
            Ok(markdown) => markdown,
            Err(e) => {
                tracing::warn!(error = %e, bytes = html.len(), "conversion failed, returning input unchanged");
                html.to_string()
            }
        }
    }

    /// Convert with only the library's built-in strip set.
    pub fn convert_with_defaults(&self, html: &str) -> String {
        self.convert::<&str>(html, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    thread_local! {
        static CALLS: Cell<usize> = const { Cell::new(0) };
        static FREES: Cell<usize> = const { Cell::new(0) };
    }

    fn calls() -> usize {
        CALLS.with(Cell::get)
    }

    fn frees() -> usize {
        FREES.with(Cell::get)
    }

    /// Renders `<html>` as `md(<html>)[<strip list>]`.
    unsafe extern "C" fn echo_convert(
        html: *const c_char,
        elements: *const *const c_char,
        len: c_int,
    ) -> *mut c_char {
        CALLS.with(|c| c.set(c.get() + 1));
        // SAFETY: test double; arguments follow the bridge's contract.
        let html = unsafe { CStr::from_ptr(html) }.to_string_lossy();
        let stripped: Vec<String> = (0..usize::try_from(len).unwrap())
            .map(|i| {
                // SAFETY: `elements` has `len` valid entries.
                unsafe { CStr::from_ptr(*elements.add(i)) }
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        CString::new(format!("md({html})[{}]", stripped.join(",")))
            .unwrap()
            .into_raw()
    }

    unsafe extern "C" fn null_convert(
        _html: *const c_char,
        _elements: *const *const c_char,
        _len: c_int,
    ) -> *mut c_char {
        CALLS.with(|c| c.set(c.get() + 1));
        ptr::null_mut()
    }

    unsafe extern "C" fn counting_free(ptr: *mut c_char) {
        FREES.with(|c| c.set(c.get() + 1));
        // SAFETY: only pointers produced by `CString::into_raw` reach here.
        drop(unsafe { CString::from_raw(ptr) });
    }

    fn echo() -> Converter {
        Converter::from_api(NativeApi {
            convert: echo_convert,
            free: counting_free,
        })
    }

    #[test]
    fn test_converts_and_frees_once() {
        let converter = echo();
        let markdown = converter.convert("<h1>Hi</h1>", &["aside"]);
        assert_eq!(markdown, "md(<h1>Hi</h1>)[aside]");
        assert_eq!(calls(), 1);
        assert_eq!(frees(), 1);

        converter.convert_with_defaults("<p>again</p>");
        assert_eq!(calls(), 2);
        assert_eq!(frees(), 2);
    }

    #[test]
    fn test_empty_input_skips_native_call() {
        let converter = echo();
        assert_eq!(converter.convert("", &["nav"]), "");
        assert_eq!(converter.convert_with_defaults(""), "");
        assert_eq!(calls(), 0);
        assert_eq!(frees(), 0);
    }

    #[test]
    fn test_null_result_returns_input() {
        let converter = Converter::from_api(NativeApi {
            convert: null_convert,
            free: counting_free,
        });
        let html = "<div>caf\u{e9} \u{1f600}</div>";
        assert_eq!(converter.convert_with_defaults(html), html);
        assert!(matches!(
            converter.try_convert::<&str>(html, &[]),
            Err(ConversionError::NullResult)
        ));
        assert_eq!(calls(), 2);
        assert_eq!(frees(), 0);
    }

    #[test]
    fn test_defaults_match_empty_list() {
        let converter = echo();
        let html = "<main><p>text</p></main>";
        assert_eq!(
            converter.convert::<String>(html, &[]),
            converter.convert_with_defaults(html)
        );
    }

    #[test]
    fn test_strip_list_keeps_order() {
        let converter = echo();
        let strip = vec![
            "aside".to_string(),
            ".cookie-banner".to_string(),
            "#promo".to_string(),
        ];
        assert_eq!(
            converter.convert("<p>x</p>", &strip[..]),
            "md(<p>x</p>)[aside,.cookie-banner,#promo]"
        );
    }

    #[test]
    fn test_interior_nul_returns_input() {
        let converter = echo();
        let html = "<p>a\0b</p>";
        assert_eq!(converter.convert_with_defaults(html), html);
        assert_eq!(converter.convert("<p>ok</p>", &["bad\0name"]), "<p>ok</p>");
        assert_eq!(calls(), 0);
    }

    #[test]
    fn test_missing_library_returns_input() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::new(LibraryLoader::with_candidates(vec![
            dir.path().join("libgremllm.so"),
        ]));
        if crate::native::loader::loaded().is_some() {
            return;
        }

        assert_eq!(converter.convert_with_defaults("<p>hi</p>"), "<p>hi</p>");
        assert!(matches!(
            converter.try_convert::<&str>("<p>hi</p>", &[]),
            Err(ConversionError::Load(LoadError::NotFound { .. }))
        ));
        assert!(converter.ensure_loaded().is_err());
    }
}
