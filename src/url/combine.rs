use url::form_urlencoded;
use url::Url;

/// Combines a base URL, an optional path suffix and query parameters
///
/// # Combination Steps
///
/// 1. Parse the base URL; reject if malformed
/// 2. Append the path of `suffix` (if non-empty) to the base path, collapsing
///    any doubled slashes the concatenation produces
/// 3. Add `params` to the existing query, keeping repeated keys
/// 4. Re-encode the query sorted by key (stable within a key)
///
/// When `params` is empty the base query string is left as it was.
///
/// # Arguments
///
/// * `base` - Absolute base URL
/// * `suffix` - Path to append; its query and fragment are ignored
/// * `params` - Query parameters to add
///
/// # Examples
///
/// ```
/// use dredge::url::combine_url;
///
/// let url = combine_url("https://example.com/api/", "/items", &[("page", "2"), ("q", "a b")]).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/api/items?page=2&q=a+b");
/// ```
pub fn combine_url(base: &str, suffix: &str, params: &[(&str, &str)]) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base)?;

    if !suffix.is_empty() {
        let joined = format!("{}{}", url.path(), suffix_path(suffix));
        url.set_path(&collapse_slashes(&joined));
    }

    Ok(with_params(url, params))
}

/// Adds query parameters to an already parsed URL
///
/// This is the parameter half of [`combine_url`], used by the GET helpers.
pub fn with_params(mut url: Url, params: &[(&str, &str)]) -> Url {
    if params.is_empty() {
        return url;
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.extend(params.iter().map(|(k, v)| (k.to_string(), v.to_string())));

    // Stable sort keeps repeated keys in insertion order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish();
    url.set_query(Some(&query));

    url
}

/// Extracts the path component of a suffix, which may itself be a full URL
fn suffix_path(suffix: &str) -> String {
    match Url::parse(suffix) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => suffix.split(['?', '#']).next().unwrap_or("").to_string(),
    }
}

fn collapse_slashes(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut previous_slash = false;

    for c in path.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        result.push(c);
    }

    result
}
