#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crucible::provider::{GenerationProvider, ProviderResult};
use crucible::Turn;

#[ctor::ctor]
fn init_tests() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// A stand-in toolchain: "compiles" by copying the source to the output and
/// marking it executable, so test programs are plain shell scripts. A source
/// containing `@compile-fail` makes it exit nonzero with a diagnostic.
const FAKE_COMPILER: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "fakecc 1.0"
    exit 0
fi
out="$2"
src="$3"
if grep -q "@compile-fail" "$src"; then
    echo "fakecc: syntax error near line 1" >&2
    exit 1
fi
cp "$src" "$out"
chmod +x "$out"
exit 0
"#;

/// Writes the stand-in compiler into a fresh directory. Keep the `TempDir`
/// alive for as long as the executor uses it.
pub fn fake_toolchain() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("create toolchain dir");
    let path = dir.path().join("fakecc");
    fs::write(&path, FAKE_COMPILER).expect("write fake compiler");
    let mut permissions = fs::metadata(&path).expect("stat fake compiler").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(&path, permissions).expect("chmod fake compiler");
    (dir, path.to_string_lossy().into_owned())
}

/// Deterministic in-process generation provider with call counting.
pub struct StubProvider {
    pub classify_result: ProviderResult<bool>,
    pub generate_result: ProviderResult<String>,
    pub chat_result: ProviderResult<String>,
    pub classify_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub chat_calls: AtomicUsize,
}

impl Default for StubProvider {
    fn default() -> Self {
        Self {
            classify_result: Ok(false),
            generate_result: Ok("int main(){return 0;}".to_string()),
            chat_result: Ok("Happy to help!".to_string()),
            classify_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            chat_calls: AtomicUsize::new(0),
        }
    }
}

impl StubProvider {
    pub fn classifying(classify_result: ProviderResult<bool>) -> Self {
        Self {
            classify_result,
            ..Default::default()
        }
    }

    pub fn classify_count(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn chat_count(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationProvider for StubProvider {
    async fn classify(&self, _message: &str) -> ProviderResult<bool> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.classify_result.clone()
    }

    async fn generate(&self, _prompt: &str, _language: &str) -> ProviderResult<String> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.generate_result.clone()
    }

    async fn chat(&self, _history: &[Turn]) -> ProviderResult<String> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_result.clone()
    }

    fn name(&self) -> &str {
        "stub"
    }
}
