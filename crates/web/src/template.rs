//! Viewer page template
//!
//! The console page is a fixed HTML document with a handful of named
//! `{{placeholder}}` slots. Each slot knows the context it sits in, so
//! values are escaped for HTML text or for a JavaScript string literal
//! accordingly.

use kvmrelay_common::{Error, Result};

const CONSOLE_TEMPLATE: &str = include_str!("../assets/console.html");

/// Values substituted into the viewer page
#[derive(Debug, Clone, Copy)]
pub struct ViewerFields<'a> {
    pub bmc_host: &'a str,
    pub rp_port: u16,
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Host,
    HostJs,
    HostnameJs,
    RpPort,
    UsernameJs,
    PasswordJs,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "host" => Some(Self::Host),
            "host_js" => Some(Self::HostJs),
            "hostname_js" => Some(Self::HostnameJs),
            "rp_port" => Some(Self::RpPort),
            "username_js" => Some(Self::UsernameJs),
            "password_js" => Some(Self::PasswordJs),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Field(Field),
}

/// A parsed page template
#[derive(Debug, Clone)]
pub struct PageTemplate<'a> {
    segments: Vec<Segment<'a>>,
}

impl<'a> PageTemplate<'a> {
    /// Split `source` into literal text and placeholders.
    pub fn parse(source: &'a str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(&rest[..start]));
            }
            let offset = source.len() - rest.len() + start;
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                Error::Template(format!("unterminated placeholder at byte {}", offset))
            })?;
            let name = after[..end].trim();
            let field = Field::from_name(name).ok_or_else(|| {
                Error::Template(format!("unknown placeholder '{}' at byte {}", name, offset))
            })?;
            segments.push(Segment::Field(field));
            rest = &after[end + 2..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, fields: &ViewerFields<'_>) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(Field::Host) => out.push_str(&html_escape(fields.bmc_host)),
                Segment::Field(Field::HostJs) => out.push_str(&js_string(fields.bmc_host)?),
                Segment::Field(Field::HostnameJs) => {
                    out.push_str(&js_string(hostname(fields.bmc_host))?)
                }
                Segment::Field(Field::RpPort) => out.push_str(&fields.rp_port.to_string()),
                Segment::Field(Field::UsernameJs) => out.push_str(&js_string(fields.username)?),
                Segment::Field(Field::PasswordJs) => out.push_str(&js_string(fields.password)?),
            }
        }
        Ok(out)
    }
}

/// Render the embedded console page.
pub fn render_console_page(fields: &ViewerFields<'_>) -> Result<String> {
    PageTemplate::parse(CONSOLE_TEMPLATE)?.render(fields)
}

/// Host part of a `host[:port]` authority. Bracketed IPv6 keeps its brackets.
fn hostname(authority: &str) -> &str {
    if authority.starts_with('[') {
        match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, _)) => host,
            None => authority,
        }
    }
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Quoted JS string literal that is also safe inside a `<script>` element.
fn js_string(value: &str) -> Result<String> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}
