// # Config Source Trait
//
// Defines the lookup interface for local override configuration.

/// Section/key lookup into local override configuration
///
/// `None` means the key is absent; `Some("")` is a present but empty value.
/// The two are distinct: only absence lets a lower-precedence source win
/// without the value being tried first.
pub trait ConfigSource: Send + Sync {
    /// Look up `key` in `section`
    fn get(&self, section: &str, key: &str) -> Option<String>;
}
