//! Runtime entry points called by natively compiled code
//!
//! Cranelift has no C variadic calls, so each `printf` call site is bound
//! to one of these fixed-arity shims, picked by the shape of its single
//! value argument.

use std::ffi::{c_char, CStr};
use std::io::Write;

/// Symbol names of the shims, indexed by argument shape.
pub const PRINTF_NONE: &str = "kestrel_printf";
/// `printf(fmt, i32)`
pub const PRINTF_INT: &str = "kestrel_printf_i32";
/// `printf(fmt, double)`
pub const PRINTF_DOUBLE: &str = "kestrel_printf_f64";
/// `printf(fmt, char*)`
pub const PRINTF_STRING: &str = "kestrel_printf_str";

/// A single value passed after the format string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrintfArg<'a> {
    Int(i32),
    Double(f64),
    Str(&'a [u8]),
}

/// Expand a C format string with at most one value argument. Supports
/// `%d`, `%i`, `%f` (with optional `.N` precision), `%s`, `%c` and `%%`.
/// Directives with no matching argument are written verbatim.
pub fn format_printf(format: &[u8], arg: Option<PrintfArg<'_>>) -> Vec<u8> {
    let mut out = Vec::with_capacity(format.len() + 16);
    let mut arg = arg;
    let mut i = 0;

    while i < format.len() {
        let byte = format[i];
        if byte != b'%' {
            out.push(byte);
            i += 1;
            continue;
        }

        let start = i;
        i += 1;
        let mut precision = None;
        if format.get(i) == Some(&b'.') {
            i += 1;
            let digits_start = i;
            while format.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            precision = std::str::from_utf8(&format[digits_start..i])
                .ok()
                .and_then(|digits| digits.parse::<usize>().ok())
                .or(Some(0));
        }

        let Some(&conversion) = format.get(i) else {
            out.extend_from_slice(&format[start..]);
            break;
        };
        i += 1;

        let rendered = match (conversion, arg) {
            (b'%', _) => Some(b"%".to_vec()),
            (b'd' | b'i', Some(PrintfArg::Int(value))) => Some(value.to_string().into_bytes()),
            (b'c', Some(PrintfArg::Int(value))) => Some(vec![value as u8]),
            (b'f', Some(PrintfArg::Double(value))) => {
                Some(format!("{:.*}", precision.unwrap_or(6), value).into_bytes())
            }
            (b's', Some(PrintfArg::Str(text))) => Some(text.to_vec()),
            _ => None,
        };

        match rendered {
            Some(bytes) => {
                if conversion != b'%' {
                    arg = None;
                }
                out.extend_from_slice(&bytes);
            }
            None => out.extend_from_slice(&format[start..i]),
        }
    }

    out
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn c_bytes<'a>(ptr: *const c_char) -> &'a [u8] {
    if ptr.is_null() {
        b"(null)"
    } else {
        CStr::from_ptr(ptr).to_bytes()
    }
}

fn emit(bytes: &[u8]) -> i32 {
    let mut stdout = std::io::stdout().lock();
    if stdout.write_all(bytes).and_then(|_| stdout.flush()).is_err() {
        return -1;
    }
    i32::try_from(bytes.len()).unwrap_or(i32::MAX)
}

/// `printf(fmt)`
pub extern "C" fn kestrel_printf(format: *const c_char) -> i32 {
    // SAFETY: generated code passes the address of an interned string.
    let format = unsafe { c_bytes(format) };
    emit(&format_printf(format, None))
}

/// `printf(fmt, i32)`
pub extern "C" fn kestrel_printf_i32(format: *const c_char, value: i32) -> i32 {
    // SAFETY: generated code passes the address of an interned string.
    let format = unsafe { c_bytes(format) };
    emit(&format_printf(format, Some(PrintfArg::Int(value))))
}

/// `printf(fmt, double)`
pub extern "C" fn kestrel_printf_f64(format: *const c_char, value: f64) -> i32 {
    // SAFETY: generated code passes the address of an interned string.
    let format = unsafe { c_bytes(format) };
    emit(&format_printf(format, Some(PrintfArg::Double(value))))
}

/// `printf(fmt, char*)`
pub extern "C" fn kestrel_printf_str(format: *const c_char, value: *const c_char) -> i32 {
    // SAFETY: both pointers come from interned strings or a null constant.
    let (format, value) = unsafe { (c_bytes(format), c_bytes(value)) };
    emit(&format_printf(format, Some(PrintfArg::Str(value))))
}
