/// Width of the digest used in entry paths: 512 bits.
pub const DIGEST_LEN: usize = 64;

/// Domain-separated BLAKE3 key hasher.
///
/// Each hasher carries a prefix naming the codec, the backing store and the
/// key/value types. The prefix is prepended to every key before hashing,
/// so two typed stores sharing a directory never map keys onto each
/// other's paths, and changing the codec or the types orphans old entries
/// instead of misreading them.
///
/// The hasher holds no mutable state; every call builds its own BLAKE3
/// context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyHasher {
    prefix: String,
}

impl KeyHasher {
    /// Create a hasher from its domain components.
    pub fn new(codec_id: &str, store_name: &str, key_type: &str, value_type: &str) -> Self {
        Self {
            prefix: format!("hoard-kv {codec_id} {store_name} {key_type} {value_type} "),
        }
    }

    /// Create a hasher for a store of `K` to `V`.
    pub fn for_types<K: ?Sized, V: ?Sized>(codec_id: &str, store_name: &str) -> Self {
        Self::new(
            codec_id,
            store_name,
            std::any::type_name::<K>(),
            std::any::type_name::<V>(),
        )
    }

    /// Entry path for a key's canonical string form.
    ///
    /// Format: `{byte length of prefixed key}-{hex digest}`.
    pub fn path(&self, key_repr: &str) -> String {
        let mut text = String::with_capacity(self.prefix.len() + key_repr.len());
        text.push_str(&self.prefix);
        text.push_str(key_repr);

        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        let mut digest = [0u8; DIGEST_LEN];
        hasher.finalize_xof().fill(&mut digest);

        format!("{}-{}", text.len(), hex::encode(digest))
    }

    /// The prefix prepended to every key.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
