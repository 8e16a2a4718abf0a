use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

type ProcessVerifier = Box<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Tamper-evidence component. Computes content digests over record identity
/// fields and keeps a map of last-seen digests per logical key so repeated
/// observations of the same process can be cross-checked.
///
/// The digest map is locked internally; callers share the stamper behind an
/// `Arc` without any external synchronization.
pub struct IntegrityStamper {
    known_digests: Mutex<HashMap<String, String>>,
    verifier: ProcessVerifier,
}

impl IntegrityStamper {
    pub fn new() -> Self {
        // Host-integrity verification is an extension point; the default
        // accepts every process.
        Self::with_verifier(Box::new(|_, _| true))
    }

    pub fn with_verifier(verifier: ProcessVerifier) -> Self {
        Self {
            known_digests: Mutex::new(HashMap::new()),
            verifier,
        }
    }

    /// SHA-256 of the content, base64-encoded. Deterministic.
    pub fn hash(&self, content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        BASE64.encode(digest)
    }

    /// Record the last-seen digest for a logical key (typically a process id).
    pub fn remember(&self, key: &str, digest: &str) {
        self.known_digests
            .lock()
            .expect("digest map mutex poisoned")
            .insert(key.to_string(), digest.to_string());
    }

    /// True iff a digest was remembered for `key` and it matches exactly.
    pub fn verify(&self, key: &str, digest: &str) -> bool {
        self.known_digests
            .lock()
            .expect("digest map mutex poisoned")
            .get(key)
            .map(|stored| stored == digest)
            .unwrap_or(false)
    }

    pub fn is_valid_process(&self, process_id: &str, machine_id: &str) -> bool {
        (self.verifier)(process_id, machine_id)
    }
}

impl Default for IntegrityStamper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn hash_is_deterministic() {
        let stamper = IntegrityStamper::new();
        let a = stamper.hash("1chrome.exe2024-05-01T09:30:00Zalice-host");
        let b = stamper.hash("1chrome.exe2024-05-01T09:30:00Zalice-host");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_yields_different_digest() {
        let stamper = IntegrityStamper::new();
        assert_ne!(stamper.hash("input-a"), stamper.hash("input-b"));
    }

    #[test]
    fn digest_is_base64_of_sha256_length() {
        let stamper = IntegrityStamper::new();
        // 32 bytes of SHA-256 encode to 44 base64 characters.
        assert_eq!(stamper.hash("anything").len(), 44);
    }

    #[test]
    fn verify_requires_remembered_matching_digest() {
        let stamper = IntegrityStamper::new();
        let digest = stamper.hash("payload");
        assert!(!stamper.verify("pid-1", &digest));

        stamper.remember("pid-1", &digest);
        assert!(stamper.verify("pid-1", &digest));
        assert!(!stamper.verify("pid-1", "forged"));
        assert!(!stamper.verify("pid-2", &digest));
    }

    #[test]
    fn remember_overwrites_previous_digest() {
        let stamper = IntegrityStamper::new();
        stamper.remember("pid-1", "old");
        stamper.remember("pid-1", "new");
        assert!(!stamper.verify("pid-1", "old"));
        assert!(stamper.verify("pid-1", "new"));
    }

    #[test]
    fn default_verifier_accepts_any_process() {
        let stamper = IntegrityStamper::new();
        assert!(stamper.is_valid_process("1234", "any-machine"));
    }

    #[test]
    fn custom_verifier_is_consulted() {
        let stamper =
            IntegrityStamper::with_verifier(Box::new(|pid, machine| pid != "666" && machine != ""));
        assert!(stamper.is_valid_process("1234", "host"));
        assert!(!stamper.is_valid_process("666", "host"));
    }

    #[test]
    fn concurrent_remember_and_verify_do_not_race() {
        let stamper = Arc::new(IntegrityStamper::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let stamper = Arc::clone(&stamper);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("pid-{}", (i + j) % 16);
                    let digest = stamper.hash(&key);
                    stamper.remember(&key, &digest);
                    assert!(stamper.verify(&key, &digest));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("worker panicked");
        }
    }
}
