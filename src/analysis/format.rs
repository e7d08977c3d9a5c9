//! printf conversions for declared C types.

use regex::Regex;

lazy_static::lazy_static! {
    static ref U64: Regex = Regex::new(r"\b(u64|uint64_t|__u64|unsigned\s+long\s+long)\b").unwrap();
    static ref S64: Regex = Regex::new(r"\b(s64|int64_t|__s64|long\s+long)\b").unwrap();
    static ref ULONG: Regex = Regex::new(r"\bunsigned\s+long\b|\bulong\b").unwrap();
    static ref LONG: Regex = Regex::new(r"\blong\b").unwrap();
    static ref U32: Regex = Regex::new(r"\b(u32|uint32_t|__u32|unsigned\s+int|unsigned)\b").unwrap();
    static ref S32: Regex = Regex::new(r"\b(s32|int32_t|__s32|int)\b").unwrap();
    static ref U16: Regex = Regex::new(r"\b(u16|uint16_t|__u16|unsigned\s+short)\b").unwrap();
    static ref S16: Regex = Regex::new(r"\b(s16|int16_t|__s16|short)\b").unwrap();
    static ref U8: Regex = Regex::new(r"\b(u8|uint8_t|__u8|unsigned\s+char)\b").unwrap();
    static ref S8: Regex = Regex::new(r"\b(s8|int8_t|__s8|char)\b").unwrap();
    static ref AGGREGATE: Regex = Regex::new(r"\b(struct|union|class)\b").unwrap();
    static ref QUALIFIERS: Regex = Regex::new(
        r"\b(const|volatile|static|register|extern|inline|restrict|__restrict|__user|__must_check)\b"
    ).unwrap();
}

/// A printf-family conversion for a value of some declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    Str,
    Pointer,
    Float,
    LongDouble,
    SignedSize,
    Size,
    U64,
    I64,
    ULong,
    Long,
    U32,
    I32,
    U16,
    I16,
    U8,
    I8,
}

impl FormatSpec {
    pub fn conversion(&self) -> &'static str {
        match self {
            FormatSpec::Str => "%s",
            FormatSpec::Pointer => "%p",
            FormatSpec::Float => "%f",
            FormatSpec::LongDouble => "%Lf",
            FormatSpec::SignedSize => "%zd",
            FormatSpec::Size => "%zu",
            FormatSpec::U64 => "%llu",
            FormatSpec::I64 => "%lld",
            FormatSpec::ULong => "%lu",
            FormatSpec::Long => "%ld",
            FormatSpec::U32 => "%u",
            FormatSpec::I32 => "%d",
            FormatSpec::U16 => "%hu",
            FormatSpec::I16 => "%hd",
            FormatSpec::U8 => "%hhu",
            FormatSpec::I8 => "%hhd",
        }
    }

    /// Pick the conversion for a declared type.
    ///
    /// Returns `None` for types a single conversion cannot print: structs,
    /// unions and classes held by value, C++ references and templates.
    /// Unknown names are assumed to be integer typedefs.
    pub fn for_type(type_text: &str) -> Option<FormatSpec> {
        let ts = type_text.trim();
        if ts.contains('&') || ts.contains('<') {
            return None;
        }
        let ts = QUALIFIERS.replace_all(ts, " ");
        let ts = ts.trim();
        let is_pointer = ts.contains('*') || ts.contains("__iomem");

        if is_pointer {
            let base = ts.trim_end_matches(|c: char| c == '*' || c.is_whitespace());
            if ts.matches('*').count() == 1 && S8.is_match(base) && !U8.is_match(base) {
                return Some(FormatSpec::Str);
            }
            return Some(FormatSpec::Pointer);
        }
        if AGGREGATE.is_match(ts) {
            return None;
        }
        if ts.contains("long double") {
            return Some(FormatSpec::LongDouble);
        }
        if ts.contains("double") || ts.contains("float") {
            return Some(FormatSpec::Float);
        }
        // ssize_t before size_t: the latter is a substring of the former.
        if ts.contains("ssize_t") {
            return Some(FormatSpec::SignedSize);
        }
        if ts.contains("size_t") {
            return Some(FormatSpec::Size);
        }

        let rules: [(&Regex, FormatSpec); 10] = [
            (&*U64, FormatSpec::U64),
            (&*S64, FormatSpec::I64),
            (&*ULONG, FormatSpec::ULong),
            (&*LONG, FormatSpec::Long),
            (&*U16, FormatSpec::U16),
            (&*S16, FormatSpec::I16),
            (&*U8, FormatSpec::U8),
            (&*S8, FormatSpec::I8),
            (&*U32, FormatSpec::U32),
            (&*S32, FormatSpec::I32),
        ];
        for (re, spec) in rules {
            if re.is_match(ts) {
                return Some(spec);
            }
        }
        Some(FormatSpec::I32)
    }
}

impl std::fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.conversion())
    }
}
