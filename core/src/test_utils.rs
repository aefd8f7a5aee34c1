// Shell scripts standing in for the compiler and the interpreters

use crate::{process::Invocation, toolchain::CommandSpec};
use std::path::{Path, PathBuf};

// Scripts are run through `sh` rather than executed directly, which sidesteps ETXTBSY when
// another test thread forks while a script is still being written.
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(format!("{name}.sh"));
    std::fs::write(&path, body).unwrap();
    path
}

pub(crate) fn sh(script: &Path) -> Invocation {
    Invocation::new("sh").arg(script)
}

pub(crate) fn sh_spec(script: &Path) -> CommandSpec {
    CommandSpec::new("sh").arg(script)
}

// compiles `<name>.as` into `<name>.abc` by copying it, unless the source mentions "syntax error"
pub(crate) const FAKE_COMPILER: &str = r#"
for last; do :; done
if grep -q "syntax error" "$last"; then
    echo "$last: syntax error" >&2
    exit 1
fi
cp "$last" "${last%.as}.abc"
"#;

// prints the artifact contents
pub(crate) const FAKE_REFERENCE: &str = r#"cat "$1""#;

// prints the artifact contents with `42` replaced, and crashes on artifacts mentioning "crash"
pub(crate) const FAKE_CANDIDATE: &str = r#"
[ "$1" = "-abc" ] || { echo "missing -abc flag"; exit 2; }
if grep -q crash "$2"; then
    echo "segmentation fault" >&2
    kill -SEGV $$
fi
sed 's/42/43/' "$2"
"#;
