//! Parser for the subset of the cask DSL that maps onto a [`Manifest`].
//!
//! ```ruby
//! cask 'grammarly' do
//!   version :latest
//!   sha256 :no_check
//!
//!   url 'https://download-editor.grammarly.com/osx/Grammarly.dmg'
//!   name 'Grammarly'
//!   homepage 'https://grammarly.com/'
//!
//!   app 'Grammarly.app'
//! end
//! ```
//!
//! Only the six stanzas above are understood. Each takes a single quoted
//! string or a bare symbol; anything else is rejected rather than ignored.
//!
//! [`Manifest`]: crate::Manifest

use std::sync::LazyLock;

use regex::Regex;

use crate::manifest::{ManifestError, RawManifest};
use crate::{LATEST, NO_CHECK};

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^cask\s*\(?\s*(?:'([^']+)'|"([^"]+)")\s*\)?\s+do$"#).expect("valid header regex")
});

static STANZA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([a-z_][a-z0-9_]*)\s*\(?\s*(?:'([^']*)'|"([^"]*)"|:([a-z_]+))\s*\)?$"#)
        .expect("valid stanza regex")
});

/// Whether `raw` looks like a DSL source rather than TOML.
pub fn looks_like_dsl(raw: &str) -> bool {
    significant_lines(raw)
        .next()
        .is_some_and(|(_, line)| line.starts_with("cask ") || line.starts_with("cask("))
}

fn significant_lines(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    raw.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

/// Parse a DSL source into its raw key/value form.
pub(crate) fn parse(raw: &str) -> Result<RawManifest, ManifestError> {
    let mut lines = significant_lines(raw);

    match lines.next() {
        Some((_, line)) if HEADER.is_match(line) => {}
        Some((n, line)) => {
            return Err(ManifestError::malformed(
                "document",
                format!("line {n}: expected `cask '<token>' do`, found `{line}`"),
            ));
        }
        None => return Err(ManifestError::malformed("document", "empty source")),
    }

    let mut manifest = RawManifest::default();
    let mut closed = false;
    let mut url_interpolates = false;

    for (n, line) in lines {
        if closed {
            return Err(ManifestError::malformed(
                "document",
                format!("line {n}: unexpected content after `end`"),
            ));
        }
        if line == "end" {
            closed = true;
            continue;
        }

        let caps = STANZA.captures(line).ok_or_else(|| {
            ManifestError::malformed("document", format!("line {n}: cannot parse `{line}`"))
        })?;

        let stanza = &caps[1];
        let value = if let Some(symbol) = caps.get(4) {
            symbol_value(stanza, symbol.as_str(), n)?
        } else {
            caps.get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        };

        let slot = match stanza {
            "name" => &mut manifest.name,
            "version" => &mut manifest.version,
            "url" => &mut manifest.url,
            "sha256" => &mut manifest.sha256,
            "homepage" => &mut manifest.homepage,
            "app" => &mut manifest.app,
            other => {
                return Err(ManifestError::malformed(
                    other,
                    format!("line {n}: unsupported stanza"),
                ));
            }
        };

        if slot.replace(value).is_some() {
            return Err(ManifestError::malformed(
                stanza,
                format!("line {n}: stanza declared more than once"),
            ));
        }
        if stanza == "url" {
            // only double-quoted strings interpolate
            url_interpolates = caps.get(3).is_some();
        }
    }

    if !closed {
        return Err(ManifestError::malformed("document", "missing closing `end`"));
    }

    if url_interpolates {
        interpolate_url(&mut manifest)?;
    }
    Ok(manifest)
}

fn symbol_value(stanza: &str, symbol: &str, line: usize) -> Result<String, ManifestError> {
    match (stanza, symbol) {
        ("version", "latest") => Ok(LATEST.to_string()),
        ("sha256", "no_check") => Ok(NO_CHECK.to_string()),
        _ => Err(ManifestError::malformed(
            stanza,
            format!("line {line}: unsupported symbol :{symbol}"),
        )),
    }
}

/// Expand `#{version}` inside the url stanza.
fn interpolate_url(manifest: &mut RawManifest) -> Result<(), ManifestError> {
    let Some(url) = manifest.url.as_mut() else {
        return Ok(());
    };
    if !url.contains("#{") {
        return Ok(());
    }

    match manifest.version.as_deref() {
        Some(v) if v != LATEST => {
            *url = url.replace("#{version}", v);
        }
        _ => {
            return Err(ManifestError::malformed(
                "url",
                "`#{version}` requires a literal version",
            ));
        }
    }

    if url.contains("#{") {
        return Err(ManifestError::malformed(
            "url",
            "only `#{version}` interpolation is supported",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Checksum, Manifest, ManifestError, Version};

    const GRAMMARLY: &str = "cask 'grammarly' do
  version :latest
  sha256 :no_check

  url 'https://download-editor.grammarly.com/osx/Grammarly.dmg'
  name 'Grammarly'
  homepage 'https://grammarly.com/'

  app 'Grammarly.app'
end
";

    #[test]
    fn parses_grammarly_cask() {
        let m = Manifest::parse(GRAMMARLY).unwrap();
        assert_eq!(m.name.as_str(), "Grammarly");
        assert_eq!(m.version, Version::Latest);
        assert_eq!(m.checksum, Checksum::Unchecked);
        assert_eq!(
            m.url.as_str(),
            "https://download-editor.grammarly.com/osx/Grammarly.dmg"
        );
        assert_eq!(m.homepage.as_deref(), Some("https://grammarly.com/"));
        assert_eq!(m.bundle_name(), "Grammarly.app");
    }

    #[test]
    fn interpolates_version_into_url() {
        let source = format!(
            "# leading comment\ncask \"example\" do\n  version \"1.2.0\"\n  sha256 \"{}\"\n  url \"https://example.test/#{{version}}/Example.zip\"\n  name \"Example\"\n  app \"Example.app\"\nend\n",
            "a".repeat(64)
        );
        let m = Manifest::parse(&source).unwrap();
        assert_eq!(m.url.as_str(), "https://example.test/1.2.0/Example.zip");
    }

    #[test]
    fn interpolation_with_latest_is_rejected() {
        let source = GRAMMARLY.replace(
            "url 'https://download-editor.grammarly.com/osx/Grammarly.dmg'",
            "url \"https://download-editor.grammarly.com/#{version}/Grammarly.dmg\"",
        );
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "url");
    }

    #[test]
    fn single_quoted_url_is_not_interpolated() {
        let source = format!(
            "cask 'example' do\n  version '1.2.0'\n  sha256 '{}'\n  url 'https://example.test/dl?v=#{{version}}'\n  name 'Example'\n  app 'Example.app'\nend\n",
            "a".repeat(64)
        );
        let m = Manifest::parse(&source).unwrap();
        assert!(!m.url.as_str().contains("1.2.0"), "{}", m.url);
        assert!(m.url.fragment().is_some_and(|f| f.contains("version")));
    }

    #[test]
    fn unsupported_stanzas_are_rejected() {
        let source = GRAMMARLY.replace("  app 'Grammarly.app'", "  pkg 'Grammarly.pkg'");
        let err = Manifest::parse(&source).unwrap_err();
        assert!(matches!(err, ManifestError::Malformed { field, .. } if field == "pkg"));
    }

    #[test]
    fn duplicate_stanzas_are_rejected() {
        let source = GRAMMARLY.replace("  name 'Grammarly'", "  name 'Grammarly'\n  name 'Other'");
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "name");
    }

    #[test]
    fn unknown_symbols_are_rejected() {
        let source = GRAMMARLY.replace("sha256 :no_check", "sha256 :skip");
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "sha256");
    }

    #[test]
    fn missing_end_is_rejected() {
        let source = GRAMMARLY.replace("end\n", "");
        let err = Manifest::parse(&source).unwrap_err();
        assert_eq!(err.field(), "document");
    }
}
