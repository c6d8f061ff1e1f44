//! Checkout link parsing.
//!
//! LTI launches that should open a notebook carry a `custom_next` parameter
//! pointing at the hub's git-pull endpoint:
//!
//! ```text
//! https://hub.example.com/hub/user-redirect/git-pull?repo=...&urlpath=tree/A/B.ipynb&branch=main
//! ```
//!
//! Some LMSes mangle query strings on the way through, so deployments wrap
//! that link once more in `/lti/redirect?next=<encoded link>`. The parser
//! unwraps one such layer before matching.

use serde::Serialize;
use url::Url;

/// Path of the redirect indirection that carries the real link in `next`.
pub const REDIRECT_PATH: &str = "/lti/redirect";

/// Path of the hub endpoint that clones a repository and opens a file in it.
pub const CHECKOUT_PATH: &str = "/hub/user-redirect/git-pull";

/// Prefix the notebook UI puts in front of file paths in `urlpath`.
const TREE_PREFIX: &str = "tree/";

/// The three query parameters of a checkout link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutLink {
    pub repo: String,
    pub urlpath: String,
    pub branch: String,
}

impl CheckoutLink {
    /// `urlpath` relative to the user's home directory, without the `tree/`
    /// UI prefix.
    pub fn checkout_path(&self) -> &str {
        self.urlpath
            .strip_prefix(TREE_PREFIX)
            .unwrap_or(&self.urlpath)
    }
}

/// Recognizes checkout links, optionally wrapped in one redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParser {
    redirect_path: String,
    checkout_path: String,
}

impl Default for LinkParser {
    fn default() -> Self {
        Self::new(REDIRECT_PATH, CHECKOUT_PATH)
    }
}

impl LinkParser {
    pub fn new(redirect_path: impl Into<String>, checkout_path: impl Into<String>) -> Self {
        Self {
            redirect_path: redirect_path.into(),
            checkout_path: checkout_path.into(),
        }
    }

    /// Parse `link` into its checkout parameters.
    ///
    /// Returns `None` for anything that is not a complete checkout link,
    /// including strings that are not URLs at all.
    pub fn parse(&self, link: &str) -> Option<CheckoutLink> {
        let url = parse_url(link)?;

        // A redirect without `next` is parsed as-is (and then fails to match).
        let url = match first_value(&url, "next") {
            Some(next) if raw_path(link) == self.redirect_path => {
                let inner = parse_url(&next)?;
                (raw_path(&next) == self.checkout_path).then_some(inner)?
            }
            _ => (raw_path(link) == self.checkout_path).then_some(url)?,
        };

        Some(CheckoutLink {
            repo: first_value(&url, "repo")?,
            urlpath: first_value(&url, "urlpath")?,
            branch: first_value(&url, "branch")?,
        })
    }
}

/// Parse `link` with the default redirect and checkout paths.
pub fn parse_checkout_link(link: &str) -> Option<CheckoutLink> {
    LinkParser::default().parse(link)
}

/// Absolute URLs parse directly; host-relative ones (`/hub/...`) are resolved
/// against a placeholder origin since only path and query matter here.
fn parse_url(raw: &str) -> Option<Url> {
    match Url::parse(raw.trim()) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) if raw.trim_start().starts_with('/') => {
            let base = Url::parse("http://localhost/").ok()?;
            base.join(raw.trim()).ok()
        }
        Err(_) => None,
    }
}

/// The path exactly as written in `raw`. Matching uses this rather than
/// `Url::path`, which resolves `.`/`..` segments and turns `\` into `/`.
fn raw_path(raw: &str) -> &str {
    let raw = raw.trim();
    let raw = raw.split(['?', '#']).next().unwrap_or(raw);
    match raw.find("://") {
        Some(i) => {
            let rest = &raw[i + 3..];
            rest.find('/').map_or("", |j| &rest[j..])
        }
        None => raw,
    }
}

/// First non-blank value of `key` in the query string.
fn first_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::form_urlencoded;

    const SAMPLE_URL: &str = "https://hub.example.com/hub/user-redirect/git-pull?repo=https%3A%2F%2Fgithub.com%2Fexample%2Ftest&urlpath=tree%2Ftest%2Findex.ipynb&branch=main";

    fn wrap(inner: &str) -> String {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("next", inner)
            .finish();
        format!("https://hub.example.com/lti/redirect?{}", query)
    }

    #[test]
    fn test_parse_checkout_link() {
        let link = parse_checkout_link(SAMPLE_URL).unwrap();
        assert_eq!(link.repo, "https://github.com/example/test");
        assert_eq!(link.urlpath, "tree/test/index.ipynb");
        assert_eq!(link.branch, "main");
    }

    #[test]
    fn test_double_encoded_link_matches_inner_link() {
        let wrapped = wrap(SAMPLE_URL);
        assert_eq!(parse_checkout_link(&wrapped), parse_checkout_link(SAMPLE_URL));
        assert!(parse_checkout_link(&wrapped).is_some());
    }

    #[test]
    fn test_extra_query_params_are_ignored() {
        let url = format!("{}&targetpath=elsewhere&app=lab", SAMPLE_URL);
        let link = parse_checkout_link(&url).unwrap();
        assert_eq!(link.repo, "https://github.com/example/test");
        assert_eq!(link.urlpath, "tree/test/index.ipynb");
        assert_eq!(link.branch, "main");
    }

    #[test]
    fn test_plus_decodes_to_space() {
        let url = "https://hub/hub/user-redirect/git-pull?repo=r&urlpath=tree%2FMLiP%2FModul+1%2Fa.ipynb&branch=main";
        let link = parse_checkout_link(url).unwrap();
        assert_eq!(link.urlpath, "tree/MLiP/Modul 1/a.ipynb");
        assert_eq!(link.checkout_path(), "MLiP/Modul 1/a.ipynb");
    }

    #[test]
    fn test_missing_any_param_is_none() {
        let base = "https://hub/hub/user-redirect/git-pull?";
        assert!(parse_checkout_link(&format!("{}urlpath=a&branch=b", base)).is_none());
        assert!(parse_checkout_link(&format!("{}repo=r&branch=b", base)).is_none());
        assert!(parse_checkout_link(&format!("{}repo=r&urlpath=a", base)).is_none());
        assert!(parse_checkout_link("https://hub/hub/user-redirect/git-pull").is_none());
    }

    #[test]
    fn test_blank_param_counts_as_missing() {
        let url = "https://hub/hub/user-redirect/git-pull?repo=&urlpath=a&branch=b";
        assert!(parse_checkout_link(url).is_none());
    }

    #[test]
    fn test_repeated_param_takes_first() {
        let url = "https://hub/hub/user-redirect/git-pull?repo=first&repo=second&urlpath=a&branch=b";
        assert_eq!(parse_checkout_link(url).unwrap().repo, "first");
    }

    #[test]
    fn test_other_path_is_none() {
        assert!(parse_checkout_link("https://hub/hub/home?repo=r&urlpath=a&branch=b").is_none());
        assert!(parse_checkout_link("https://hub/").is_none());
    }

    #[test]
    fn test_redirect_without_next_is_not_unwrapped() {
        let url = "https://hub/lti/redirect?repo=r&urlpath=a&branch=b";
        assert!(parse_checkout_link(url).is_none());
    }

    #[test]
    fn test_redirect_to_non_checkout_link_is_none() {
        assert!(parse_checkout_link(&wrap("https://hub/hub/home")).is_none());
    }

    #[test]
    fn test_host_relative_link() {
        let link =
            parse_checkout_link("/hub/user-redirect/git-pull?repo=r&urlpath=tree%2Fx%2Fy&branch=b")
                .unwrap();
        assert_eq!(link.checkout_path(), "x/y");
    }

    #[test]
    fn test_path_is_matched_as_written() {
        let query = "?repo=r&urlpath=tree%2Fa&branch=b";
        for path in [
            "/hub/x/../user-redirect/git-pull",
            "/hub/./user-redirect/git-pull",
            "/hub\\user-redirect\\git-pull",
            "/hub/user-redirect/%2e%2e/user-redirect/git-pull",
        ] {
            let absolute = format!("https://hub{}{}", path, query);
            assert!(parse_checkout_link(&absolute).is_none(), "path: {:?}", path);
            let relative = format!("{}{}", path, query);
            assert!(parse_checkout_link(&relative).is_none(), "path: {:?}", path);
            assert!(parse_checkout_link(&wrap(&absolute)).is_none(), "path: {:?}", path);
        }
        assert!(parse_checkout_link("https://hub/lti/x/../redirect?next=%2Fhub").is_none());
    }

    #[test]
    fn test_raw_path() {
        assert_eq!(raw_path("https://hub/a/b?x=1#f"), "/a/b");
        assert_eq!(raw_path(" /a/../b?x "), "/a/../b");
        assert_eq!(raw_path("https://hub"), "");
        assert_eq!(raw_path("https://hub?x=a://b/c"), "");
    }

    #[test]
    fn test_garbage_input_is_none() {
        for input in ["", "   ", "not a url", "::::", "http://", "%%%", "tree/a/b.ipynb"] {
            assert!(parse_checkout_link(input).is_none(), "input: {:?}", input);
        }
    }

    #[test]
    fn test_checkout_path_without_tree_prefix_is_unchanged() {
        let link = CheckoutLink {
            repo: "r".into(),
            urlpath: "lab/tree/x.ipynb".into(),
            branch: "main".into(),
        };
        assert_eq!(link.checkout_path(), "lab/tree/x.ipynb");
    }

    #[test]
    fn test_custom_paths() {
        let parser = LinkParser::new("/jump", "/pull");
        let inner = "https://hub/pull?repo=r&urlpath=tree%2Fa&branch=b";
        let outer = format!("https://hub/jump?next={}", urlencode(inner));
        assert_eq!(parser.parse(&outer).unwrap().urlpath, "tree/a");
        assert!(parser.parse(SAMPLE_URL).is_none());
    }

    fn urlencode(s: &str) -> String {
        form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }
}
