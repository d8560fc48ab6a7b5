//! First-line heading extraction

/// A template split into its implicit subject and the remaining body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heading<'a> {
    /// Text of a leading `#` heading, trimmed
    pub subject: Option<&'a str>,
    /// Template body with the heading line removed
    pub body: &'a str,
}

/// Split a leading markdown heading off `template`.
///
/// Only the first line is examined. When it starts with `#`, the run of `#`
/// markers is dropped and the rest of the line becomes the subject; the body
/// is everything after that line's break. A heading marker with no text is
/// left in place.
pub fn parse_heading(template: &str) -> Heading<'_> {
    let (first_line, rest) = match template.find('\n') {
        Some(index) => (&template[..index], &template[index + 1..]),
        None => (template, ""),
    };

    let Some(marked) = first_line.strip_prefix('#') else {
        return Heading {
            subject: None,
            body: template,
        };
    };

    let subject = marked.trim_start_matches('#').trim();
    if subject.is_empty() {
        return Heading {
            subject: None,
            body: template,
        };
    }

    Heading {
        subject: Some(subject),
        body: rest,
    }
}
