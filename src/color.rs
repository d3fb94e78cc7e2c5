use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("did not understand color: \"{0}\". Expected one of always, never, or auto")]
    Invalid(String),
}

/// Whether diff output gets ANSI colors.
///
/// `resolve` never returns `Auto`; it is kept as a variant so the raw
/// user choice can be represented before terminal detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    Always,
    Never,
    #[default]
    Auto,
}

impl ColorMode {
    /// Parse the `--color` value and settle `auto` against the stdout TTY state.
    pub fn resolve(raw: &str, stdout_is_tty: bool) -> Result<ColorMode, ColorError> {
        let requested = match raw {
            "always" => ColorMode::Always,
            "never" => ColorMode::Never,
            "auto" => ColorMode::Auto,
            other => return Err(ColorError::Invalid(other.to_string())),
        };
        Ok(match requested {
            ColorMode::Auto if stdout_is_tty => ColorMode::Always,
            ColorMode::Auto => ColorMode::Never,
            explicit => explicit,
        })
    }

    pub fn enabled(self) -> bool {
        self == ColorMode::Always
    }
}
