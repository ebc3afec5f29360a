/*!
# Fingerprints

Deterministic digests of aspect configurations, used as cache keys by
build drivers: two configurations that would rewrite code identically hash
identically, and any change to a join point, advice or template changes the
digest.

Values feed a streaming SHA-512 through [`Hasher::named`], which frames every
composite value with control bytes:

```text
SOH name STX ( SOH index STX value ETX )* ETX name
```

so `{A},{B}` can never produce the same byte stream as `{A,B}`. The final
digest is URL-safe base64.
*/

use std::collections::{BTreeMap, HashMap};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use sha2::{Digest, Sha512};

const SOH: &[u8] = &[0x01];
const STX: &[u8] = &[0x02];
const ETX: &[u8] = &[0x03];

/// A value that can be fed to a [`Hasher`].
pub trait Hashable {
    fn hash_into(&self, hasher: &mut Hasher);
}

/// Streaming hash accumulator. Dropping it releases its state.
#[derive(Clone, Default)]
pub struct Hasher {
    digest: Sha512,
}

impl Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write(value.as_bytes());
    }

    /// Writes a framed composite value.
    pub fn named(&mut self, name: &str, values: &[&dyn Hashable]) {
        self.write(SOH);
        self.write_str(name);
        self.write(STX);
        for (index, value) in values.iter().enumerate() {
            self.write(SOH);
            self.write_str(&index.to_string());
            self.write(STX);
            value.hash_into(self);
            self.write(ETX);
        }
        self.write(ETX);
        self.write_str(name);
    }

    /// Digest of everything written so far. The hasher stays usable.
    pub fn finish(&self) -> String {
        let digest = self.digest.clone().finalize();
        URL_SAFE.encode(digest)
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").finish_non_exhaustive()
    }
}

/// Fingerprint of a single value.
pub fn fingerprint(value: &dyn Hashable) -> String {
    let mut hasher = Hasher::new();
    value.hash_into(&mut hasher);
    hasher.finish()
}

impl Hashable for bool {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.write_str(if *self { "true" } else { "false" });
    }
}

macro_rules! hash_integers {
    ($($ty:ty),*) => {
        $(
            impl Hashable for $ty {
                fn hash_into(&self, hasher: &mut Hasher) {
                    hasher.write_str(&self.to_string());
                }
            }
        )*
    };
}

hash_integers!(i32, i64, u32, u64, usize);

impl Hashable for str {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.write_str(self);
    }
}

impl Hashable for String {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.write_str(self);
    }
}

impl<T: Hashable + ?Sized> Hashable for &T {
    fn hash_into(&self, hasher: &mut Hasher) {
        (**self).hash_into(hasher);
    }
}

impl<T: Hashable + ?Sized> Hashable for Box<T> {
    fn hash_into(&self, hasher: &mut Hasher) {
        (**self).hash_into(hasher);
    }
}

/// `None` hashes like an empty string.
impl<T: Hashable> Hashable for Option<T> {
    fn hash_into(&self, hasher: &mut Hasher) {
        if let Some(value) = self {
            value.hash_into(hasher);
        }
    }
}

impl<T: Hashable> Hashable for [T] {
    fn hash_into(&self, hasher: &mut Hasher) {
        let values: Vec<&dyn Hashable> = self.iter().map(|v| v as &dyn Hashable).collect();
        hasher.named("list", &values);
    }
}

impl<T: Hashable> Hashable for Vec<T> {
    fn hash_into(&self, hasher: &mut Hasher) {
        self.as_slice().hash_into(hasher);
    }
}

struct Entry<'a, V: ?Sized> {
    key: &'a str,
    value: &'a V,
}

impl<V: Hashable + ?Sized> Hashable for Entry<'_, V> {
    fn hash_into(&self, hasher: &mut Hasher) {
        hasher.named("entry", &[&self.key, &self.value]);
    }
}

fn hash_entries<'a, V: Hashable + 'a>(
    hasher: &mut Hasher,
    entries: impl Iterator<Item = (&'a String, &'a V)>,
) {
    let mut entries: Vec<Entry<'a, V>> = entries
        .map(|(key, value)| Entry {
            key: key.as_str(),
            value,
        })
        .collect();
    entries.sort_by(|a, b| a.key.cmp(b.key));
    let values: Vec<&dyn Hashable> = entries.iter().map(|e| e as &dyn Hashable).collect();
    hasher.named("map", &values);
}

impl<V: Hashable> Hashable for BTreeMap<String, V> {
    fn hash_into(&self, hasher: &mut Hasher) {
        hash_entries(hasher, self.iter());
    }
}

impl<V: Hashable> Hashable for HashMap<String, V> {
    fn hash_into(&self, hasher: &mut Hasher) {
        hash_entries(hasher, self.iter());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let value = vec!["a".to_string(), "b".to_string()];
        assert_eq!(fingerprint(&value), fingerprint(&value));
    }

    #[test]
    fn test_primitives_do_not_collide() {
        let digests = [
            fingerprint(&true),
            fingerprint(&false),
            fingerprint(&0i64),
            fingerprint(&String::new()),
        ];
        for (i, a) in digests.iter().enumerate() {
            for b in &digests[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_none_and_empty_string_collide() {
        assert_eq!(fingerprint(&None::<String>), fingerprint(&String::new()));
    }

    #[test]
    fn test_framing_separates_nesting() {
        let mut joined = Hasher::new();
        joined.named("x", &[&"ab"]);
        let mut split = Hasher::new();
        split.named("x", &[&"a", &"b"]);
        assert_ne!(joined.finish(), split.finish());

        let mut nested = Hasher::new();
        nested.named("x", &[&vec!["a".to_string()], &vec!["b".to_string()]]);
        let mut flat = Hasher::new();
        flat.named("x", &[&vec!["a".to_string(), "b".to_string()]]);
        assert_ne!(nested.finish(), flat.finish());
    }

    #[test]
    fn test_map_hash_ignores_insertion_order() {
        let mut first = HashMap::new();
        let mut second = HashMap::new();
        for key in ["alpha", "beta", "gamma", "delta"] {
            first.insert(key.to_string(), key.len());
        }
        for key in ["delta", "gamma", "beta", "alpha"] {
            second.insert(key.to_string(), key.len());
        }
        assert_eq!(fingerprint(&first), fingerprint(&second));

        let ordered: BTreeMap<String, usize> = first.clone().into_iter().collect();
        assert_eq!(fingerprint(&ordered), fingerprint(&first));

        second.insert("alpha".to_string(), 0);
        assert_ne!(fingerprint(&first), fingerprint(&second));
    }

    #[test]
    fn test_finish_is_not_destructive() {
        let mut hasher = Hasher::new();
        hasher.write_str("abc");
        let first = hasher.finish();
        assert_eq!(first, hasher.finish());
        hasher.write_str("d");
        assert_ne!(first, hasher.finish());
    }

    #[test]
    fn test_digest_is_url_safe_base64_of_sha512() {
        let digest = fingerprint(&"anything");
        // 64 bytes encode to 88 characters with padding.
        assert_eq!(digest.len(), 88);
        assert!(!digest.contains('+') && !digest.contains('/'));
    }
}
