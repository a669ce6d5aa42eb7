use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Force quiet mode (the `--quiet` flag); must run before the first
/// [`is_quiet`] call to take effect.
pub fn set_quiet(quiet: bool) {
    let _ = QUIET.set(quiet);
}

/// Quiet mode suppresses decorative output; `REVGRAPH_QUIET=1` enables it.
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("REVGRAPH_QUIET")
            .map(|v| parse_flag(&v))
            .unwrap_or(false)
    })
}
