//! Feishu wiki URL parsing.
//!
//! Links look like `https://tenant.feishu.cn/wiki/NODE?table=TBL&view=VEW`.

use reqwest::Url;

/// Where a Bitable table lives, as encoded in a wiki link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitableLocation {
    /// Wiki node token, resolved to the Bitable app token at runtime.
    pub node_token: String,
    pub table_id: Option<String>,
    pub view_id: Option<String>,
}

/// Extract node token, table and view from a wiki link.
///
/// Returns `None` if the URL does not parse or has no `/wiki/<token>` path.
pub fn parse_wiki_url(url: &str) -> Option<BitableLocation> {
    let parsed = Url::parse(url.trim()).ok()?;

    let mut segments = parsed.path_segments()?;
    segments.find(|s| *s == "wiki")?;
    let node_token = segments.next().filter(|s| !s.is_empty())?.to_string();

    let mut table_id = None;
    let mut view_id = None;
    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "table" => table_id = Some(value.into_owned()),
            "view" => view_id = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(BitableLocation {
        node_token,
        table_id,
        view_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_link() {
        let loc = parse_wiki_url(
            "https://acme.feishu.cn/wiki/WikNode123?table=tblApps&view=vewAll&from=share",
        )
        .expect("parsed");
        assert_eq!(loc.node_token, "WikNode123");
        assert_eq!(loc.table_id.as_deref(), Some("tblApps"));
        assert_eq!(loc.view_id.as_deref(), Some("vewAll"));
    }

    #[test]
    fn test_parse_without_query() {
        let loc = parse_wiki_url("https://acme.feishu.cn/wiki/WikNode123").expect("parsed");
        assert_eq!(loc.node_token, "WikNode123");
        assert!(loc.table_id.is_none());
        assert!(loc.view_id.is_none());
    }

    #[test]
    fn test_rejects_non_wiki_links() {
        assert!(parse_wiki_url("https://acme.feishu.cn/base/bascn123?table=t").is_none());
        assert!(parse_wiki_url("https://acme.feishu.cn/wiki/").is_none());
        assert!(parse_wiki_url("not a url").is_none());
    }
}
