//! Command line spelling
//!
//! The service accepts its long options with a single dash (`-cfg`, `-log`)
//! as well as the usual double dash. Single dash spellings are rewritten
//! before argument parsing so `-cfg` is not read as `-c -f -g`.

use std::ffi::OsString;

/// Long options that may be written with a single dash
pub const LONG_OPTIONS: [&str; 4] = ["cfg", "log", "dump-config", "cycles"];

/// Long options followed by a separate value argument
const VALUE_OPTIONS: [&str; 3] = ["cfg", "log", "cycles"];

/// Rewrite single dash long options to their double dash form
///
/// `-cfg path` and `-cfg=path` become `--cfg path` and `--cfg=path`. The
/// program name, option values and everything after `--` pass through.
pub fn normalize_args<I, A>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = A>,
    A: Into<OsString>,
{
    let mut out = Vec::new();
    let mut args = args.into_iter().map(Into::into);

    if let Some(program) = args.next() {
        out.push(program);
    }

    let mut expect_value = false;
    let mut passthrough = false;

    for arg in args {
        if passthrough || expect_value {
            expect_value = false;
            out.push(arg);
            continue;
        }

        let Some(text) = arg.to_str() else {
            out.push(arg);
            continue;
        };

        if text == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let name = text
            .strip_prefix("--")
            .or_else(|| text.strip_prefix('-'))
            .unwrap_or("");
        let (option, inline_value) = match name.split_once('=') {
            Some((option, _)) => (option, true),
            None => (name, false),
        };

        if LONG_OPTIONS.contains(&option) {
            expect_value = !inline_value && VALUE_OPTIONS.contains(&option);
            out.push(OsString::from(format!("--{name}")));
        } else {
            out.push(arg);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(args: &[&str]) -> Vec<String> {
        normalize_args(args.iter().copied())
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect()
    }

    #[test]
    fn test_single_dash_long_options() {
        assert_eq!(
            normalize(&["wxrx", "-cfg", "/etc/wx.cfg", "-log", "/tmp/x.log", "-d"]),
            ["wxrx", "--cfg", "/etc/wx.cfg", "--log", "/tmp/x.log", "-d"]
        );
    }

    #[test]
    fn test_double_dash_unchanged() {
        assert_eq!(
            normalize(&["wxrx", "--cfg", "a.cfg", "--dump-config", "--cycles", "3"]),
            ["wxrx", "--cfg", "a.cfg", "--dump-config", "--cycles", "3"]
        );
    }

    #[test]
    fn test_inline_values() {
        assert_eq!(
            normalize(&["wxrx", "-cfg=a.cfg", "-dump-config", "-cycles=5"]),
            ["wxrx", "--cfg=a.cfg", "--dump-config", "--cycles=5"]
        );
    }

    #[test]
    fn test_values_are_not_rewritten() {
        assert_eq!(
            normalize(&["wxrx", "-cfg", "-log", "-d"]),
            ["wxrx", "--cfg", "-log", "-d"]
        );
        assert_eq!(
            normalize(&["wxrx", "--", "-cfg"]),
            ["wxrx", "--", "-cfg"]
        );
    }

    #[test]
    fn test_short_flags_untouched() {
        assert_eq!(normalize(&["wxrx", "-d", "-V"]), ["wxrx", "-d", "-V"]);
        assert_eq!(normalize(&["wxrx"]), ["wxrx"]);
    }
}
