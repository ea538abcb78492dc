// std
use std::sync::LazyLock;
// crates.io
use regex::Regex;
// self
use crate::{_prelude::*, error::PaginationError};

static LINK_VALUE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^<([^<>]*)>\s*(.*)$").expect("Link value pattern should compile.")
});

/// One parsed `Link` header entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkValue {
	/// Target URI, as sent (absolute or relative).
	pub target: String,
	/// Relation types from the `rel` parameter.
	pub rels: Vec<String>,
}
impl LinkValue {
	/// Whether the entry carries relation `rel` (ASCII case-insensitive).
	pub fn has_rel(&self, rel: &str) -> bool {
		self.rels.iter().any(|candidate| candidate.eq_ignore_ascii_case(rel))
	}
}

/// Target of the `rel="next"` entry across every `Link` header, if any.
///
/// Any malformed entry is an error even when another entry is well formed.
pub fn next_link(headers: &HeaderMap) -> Result<Option<String>, PaginationError> {
	let mut next = None;

	for value in headers.get_all(LINK) {
		let text = value.to_str().map_err(|_| PaginationError::NonTextLink)?;

		for entry in split_unquoted(text, ',').filter(|entry| !entry.trim().is_empty()) {
			let link = parse_link_value(entry)?;

			if next.is_none() && link.has_rel("next") {
				next = Some(link.target);
			}
		}
	}

	Ok(next)
}

/// Parses one `<uri>; param=value; ...` entry that must carry a `rel` parameter.
pub fn parse_link_value(entry: &str) -> Result<LinkValue, PaginationError> {
	let malformed = || PaginationError::MalformedLink { value: entry.to_owned() };
	let captures = LINK_VALUE.captures(entry.trim()).ok_or_else(malformed)?;
	let target = captures[1].trim().to_owned();
	let params = captures[2].trim();

	if !params.is_empty() && !params.starts_with(';') {
		return Err(malformed());
	}

	let mut rels = None;

	for param in split_unquoted(params, ';').map(str::trim).filter(|param| !param.is_empty()) {
		let (name, value) = param.split_once('=').ok_or_else(malformed)?;

		if name.trim().eq_ignore_ascii_case("rel") && rels.is_none() {
			let value = value.trim().trim_matches('"');

			rels = Some(value.split_ascii_whitespace().map(ToOwned::to_owned).collect::<Vec<_>>());
		}
	}

	match rels {
		Some(rels) if !rels.is_empty() => Ok(LinkValue { target, rels }),
		_ => Err(malformed()),
	}
}

// Splits on `separator` outside `<...>` and quoted strings; URIs and parameter values may
// contain either separator.
fn split_unquoted(text: &str, separator: char) -> impl Iterator<Item = &str> {
	let mut parts = Vec::new();
	let mut depth = 0_usize;
	let mut quoted = false;
	let mut escaped = false;
	let mut start = 0;

	for (idx, ch) in text.char_indices() {
		if quoted {
			match ch {
				_ if escaped => escaped = false,
				'\\' => escaped = true,
				'"' => quoted = false,
				_ => {},
			}

			continue;
		}

		match ch {
			'"' if depth == 0 => quoted = true,
			'<' => depth += 1,
			'>' => depth = depth.saturating_sub(1),
			_ if ch == separator && depth == 0 => {
				parts.push(&text[start..idx]);
				start = idx + ch.len_utf8();
			},
			_ => {},
		}
	}

	parts.push(&text[start..]);

	parts.into_iter()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn headers(values: &[&'static str]) -> HeaderMap {
		let mut map = HeaderMap::new();

		for value in values {
			map.append(LINK, HeaderValue::from_static(value));
		}

		map
	}

	#[test]
	fn next_is_found_among_several_relations() {
		let map = headers(&[
			r#"<https://acme.okta.com/api/v1/users?limit=2>; rel="self""#,
			r#"<https://acme.okta.com/api/v1/users?after=00u2&limit=2>; rel="next""#,
		]);

		assert_eq!(
			next_link(&map).expect("Links should parse."),
			Some("https://acme.okta.com/api/v1/users?after=00u2&limit=2".into())
		);

		let combined = headers(&[r#"</api/v1/groups?a=1,2>; rel="self", </api/v1/groups?after=x>; rel=next"#]);

		assert_eq!(
			next_link(&combined).expect("Comma-joined links should parse."),
			Some("/api/v1/groups?after=x".into())
		);
	}

	#[test]
	fn absent_next_means_last_page() {
		assert_eq!(next_link(&HeaderMap::new()).expect("No header is fine."), None);
		assert_eq!(
			next_link(&headers(&[r#"<https://acme.okta.com/x>; rel="self""#]))
				.expect("Self-only links should parse."),
			None
		);
	}

	#[test]
	fn malformed_values_are_errors() {
		for value in [
			"<https://acme.okta.com/api/v1/users?after=1>",
			r#"https://acme.okta.com/api/v1/users; rel="next""#,
			r#"<https://acme.okta.com/api/v1/users; rel="next""#,
			r#"<https://acme.okta.com/api/v1/users>; title="x""#,
			r#"<https://acme.okta.com/api/v1/users> rel="next""#,
		] {
			assert!(
				matches!(next_link(&headers(&[value])), Err(PaginationError::MalformedLink { .. })),
				"{value} should be rejected."
			);
		}
	}

	#[test]
	fn separators_inside_quoted_parameters_are_kept() {
		for value in [
			r#"<https://acme.okta.com/p2>; rel="next"; title="a, b""#,
			r#"<https://acme.okta.com/p2>; rel="next"; title="a;b""#,
			r#"<https://acme.okta.com/p2>; title="say \"hi\", then; go"; rel="next""#,
		] {
			assert_eq!(
				next_link(&headers(&[value])).expect("Quoted separators should not split."),
				Some("https://acme.okta.com/p2".into()),
				"{value} should yield its next link."
			);
		}

		let combined = headers(&[
			r#"</p1>; rel="prev"; title="x, y", <https://acme.okta.com/p3>; rel="next""#,
		]);

		assert_eq!(
			next_link(&combined).expect("Quoted comma between entries should parse."),
			Some("https://acme.okta.com/p3".into())
		);
	}

	#[test]
	fn rel_accepts_multiple_relation_types() {
		let link = parse_link_value(r#"<https://acme.okta.com/p2>; rel="next last""#)
			.expect("Multi-relation link should parse.");

		assert!(link.has_rel("next"));
		assert!(link.has_rel("LAST"));
	}
}
