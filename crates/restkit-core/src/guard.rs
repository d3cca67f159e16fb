//! Negotiation guard: security roles, language and content-type checks
//!
//! All three checks run after preprocessing and before parameter binding,
//! so a rejected request never leaks side effects from binding or
//! invocation.

use crate::error::{ApiError, Result};
use crate::request::Request;
use std::cmp::Ordering;

/// Check the declared roles against the caller's principal.
///
/// An empty declared set means no restriction. `*` accepts any caller that
/// carries a principal. Otherwise the principal's roles must intersect the
/// declared set. A restricted method with no principal at all is a 401;
/// a principal without a matching role is a 403.
pub fn authorize(roles: &[String], request: &Request) -> Result<()> {
    if roles.is_empty() {
        return Ok(());
    }

    let principal = request
        .principal()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if roles.iter().any(|r| r == "*") {
        return Ok(());
    }

    if principal.roles.iter().any(|r| roles.contains(r)) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "Caller `{}` lacks a required role",
            principal.name
        )))
    }
}

/// Negotiate the response language against the request's `Accept-Language`.
///
/// An empty declared set means no restriction and selects nothing. A
/// missing header counts as "anything" and selects the first declared
/// language. Otherwise the best q-ordered overlap wins, or the request is
/// rejected as not acceptable.
pub fn negotiate_language(accepted: &[String], request: &Request) -> Result<Option<String>> {
    if accepted.is_empty() {
        return Ok(None);
    }

    let Some(header) = request.header("accept-language") else {
        return Ok(Some(accepted[0].clone()));
    };

    for (tag, _q) in parse_quality_list(header) {
        if tag == "*" {
            return Ok(Some(accepted[0].clone()));
        }
        if let Some(selected) = accepted.iter().find(|a| language_matches(a.as_str(), &tag)) {
            return Ok(Some(selected.clone()));
        }
    }

    Err(ApiError::not_acceptable(
        "No acceptable language for this resource",
    ))
}

/// Negotiate the request body type against the declared accepted media
/// types.
///
/// An empty declared set means no restriction. A request without a
/// `Content-Type` declares nothing and passes. Wildcards are honored on the
/// declared side (`*/*`, `application/*`).
pub fn negotiate_content_type(accepted: &[String], request: &Request) -> Result<()> {
    if accepted.is_empty() {
        return Ok(());
    }

    let Some(content_type) = request.content_type() else {
        return Ok(());
    };

    if accepted.iter().any(|a| media_type_matches(a.as_str(), content_type)) {
        Ok(())
    } else {
        Err(ApiError::unsupported_media_type(format!(
            "Unsupported media type: {}",
            content_type
        )))
    }
}

// Parse a `tag;q=0.8, tag2` header into (tag, q) pairs, highest q first.
// The sort is stable, so equal-q tags keep their header order.
fn parse_quality_list(header: &str) -> Vec<(String, f32)> {
    let mut entries: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.trim().split(';');
            let tag = pieces.next()?.trim();
            if tag.is_empty() {
                return None;
            }
            let q = pieces
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(1.0);
            Some((tag.to_ascii_lowercase(), q))
        })
        .filter(|(_, q)| *q > 0.0)
        .collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    entries
}

// A declared language matches a requested tag when they are equal or when
// one is the primary subtag of the other ("en" vs "en-US", both ways).
fn language_matches(accepted: &str, requested: &str) -> bool {
    let accepted = accepted.to_ascii_lowercase();
    accepted == requested
        || requested
            .strip_prefix(accepted.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
        || accepted
            .strip_prefix(requested)
            .is_some_and(|rest| rest.starts_with('-'))
}

fn media_type_matches(accepted: &str, actual: &str) -> bool {
    let accepted = accepted.to_ascii_lowercase();
    let actual = actual.to_ascii_lowercase();
    let accepted = accepted.split(';').next().unwrap_or("").trim();
    if accepted == "*/*" {
        return true;
    }

    let (Some((a_type, a_sub)), Some((r_type, r_sub))) =
        (accepted.split_once('/'), actual.split_once('/'))
    else {
        return accepted == actual;
    };

    (a_type == "*" || a_type == r_type) && (a_sub == "*" || a_sub == r_sub)
}
