use std::collections::BTreeSet;

/// Functions patched out of the box: the usual sources of nondeterminism.
pub const DEFAULT_WHITELIST: &[&str] = &[
    "mt_rand",
    "rand",
    "uniqid",
    "hash_hmac",
    "md5",
    "sha1",
    "hash",
    "time",
    "microtime",
    "date",
    "function_exists",
    // by-reference parameter, needs a dedicated proxy method
    "openssl_random_pseudo_bytes",
];

/// Functions that must never be redirected.
pub const DEFAULT_BLACKLIST: &[&str] = &[
    // crashes the interpreter when proxied
    "call_user_func_array",
    "exit__",
    // return by reference
    "get_instance",
    "get_config",
    "load_class",
    "get_mimes",
    "_get_validation_object",
    // by-reference parameters
    "preg_replace",
    "preg_match",
    "preg_match_all",
    "array_unshift",
    "array_shift",
    "sscanf",
    "ksort",
    "krsort",
    "str_ireplace",
    "str_replace",
    "is_callable",
    "flock",
    "end",
    "idn_to_ascii",
    // raise the exit signal of the request layer
    "show_404",
    "show_error",
    "redirect",
];

/// Set of function names, lower-cased once on insertion.
///
/// PHP function names are ASCII case-insensitive, so lookups fold the
/// candidate the same way. Iteration order is sorted, which keeps snapshots
/// of the set stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    names: BTreeSet<String>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for name in names {
            set.insert(name.as_ref());
        }
        set
    }

    pub fn default_whitelist() -> Self {
        Self::from_names(DEFAULT_WHITELIST)
    }

    pub fn default_blacklist() -> Self {
        Self::from_names(DEFAULT_BLACKLIST)
    }

    /// Insert a name. Returns false for empty names and names already present.
    pub fn insert(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        self.names.insert(name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(&name.trim().to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.names.contains(&name.to_ascii_lowercase())
        } else {
            self.names.contains(name)
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
