use reqwest::Url;

use super::{ValidationError, ISBN_LEN, JP_E_CODE_LEN};

pub const RSS_URL_BASE: &str = "https://ndlsearch.ndl.go.jp/rss/ndls/bib.xml";
pub const OAI_PMH_URL_BASE: &str = "https://ndlsearch.ndl.go.jp/api/oaipmh";
pub const THUMBNAIL_URL_BASE: &str = "https://ndlsearch.ndl.go.jp/thumbnail";
/// The publisher-supplied (JPRO) repository.
pub const REPOSITORY: &str = "R100000137";

const LATEST_ALL_MAX: usize = 1000;
const LATEST_WITH_KEYWORDS_MAX: usize = 100;

fn build(base: &str, size: usize, keywords: &[String]) -> Result<String, ValidationError> {
    let mut url = Url::parse(base).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
    {
        let size = size.to_string();
        let mut query = url.query_pairs_mut();
        query
            .append_pair("cs", "bib")
            .append_pair("display", "panel")
            .append_pair("from", "0")
            .append_pair("size", &size)
            .append_pair("sort", "published:desc")
            .append_pair("f-ht", "ndl")
            .append_pair("f-ht", "library")
            .append_pair("f-repository", REPOSITORY)
            .append_pair("f-doc_style", "digital")
            .append_pair("f-doc_style", "paper")
            .append_pair("f-mt", "dtbook")
            .append_pair("f-mt", "dbook");
        for keyword in keywords {
            query.append_pair("keyword", keyword);
        }
    }
    Ok(url.into())
}

/// Newest publisher-registered books. `size` is clamped into 1..=1000.
pub fn latest_all(base: &str, size: usize) -> Result<String, ValidationError> {
    build(base, size.clamp(1, LATEST_ALL_MAX), &[])
}

/// Newest books matching every keyword. `size` is clamped into 1..=100.
pub fn latest_with_keywords(base: &str, keywords: &[String], size: usize) -> Result<String, ValidationError> {
    if keywords.is_empty() {
        return Err(ValidationError::EmptyKeywords);
    }
    build(base, size.clamp(1, LATEST_WITH_KEYWORDS_MAX), keywords)
}

/// Cover image for an ISBN or JP-e code. Hyphens are ignored.
pub fn thumbnail(identifier: &str) -> Option<String> {
    let identifier = identifier.replace('-', "");
    match identifier.chars().count() {
        ISBN_LEN | JP_E_CODE_LEN => Some(format!("{THUMBNAIL_URL_BASE}/{identifier}.jpg")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXED_QUERY: &str = "cs=bib&display=panel&from=0&size={size}&sort=published%3Adesc&f-ht=ndl&f-ht=library&f-repository=R100000137&f-doc_style=digital&f-doc_style=paper&f-mt=dtbook&f-mt=dbook";

    fn expected(size: usize) -> String {
        format!("{RSS_URL_BASE}?{}", FIXED_QUERY.replace("{size}", &size.to_string()))
    }

    #[test]
    fn test_latest_all_query() {
        assert_eq!(latest_all(RSS_URL_BASE, 10).unwrap(), expected(10));
    }

    #[test]
    fn test_latest_all_clamps_size() {
        assert_eq!(latest_all(RSS_URL_BASE, 0).unwrap(), expected(1));
        assert_eq!(latest_all(RSS_URL_BASE, 5000).unwrap(), expected(1000));
    }

    #[test]
    fn test_latest_with_keywords_repeats_keyword() {
        let keywords = vec!["machine learning".to_string(), "rust".to_string()];
        let url = latest_with_keywords(RSS_URL_BASE, &keywords, 500).unwrap();
        assert_eq!(url, format!("{}&keyword=machine+learning&keyword=rust", expected(100)));
    }

    #[test]
    fn test_latest_with_keywords_requires_keywords() {
        assert_eq!(
            latest_with_keywords(RSS_URL_BASE, &[], 10),
            Err(ValidationError::EmptyKeywords)
        );
    }

    #[test]
    fn test_bad_base_is_rejected() {
        assert!(matches!(latest_all("not a url", 10), Err(ValidationError::InvalidUrl(_))));
    }

    #[test]
    fn test_thumbnail() {
        assert_eq!(
            thumbnail("978-4-00-000000-2").as_deref(),
            Some("https://ndlsearch.ndl.go.jp/thumbnail/9784000000002.jpg")
        );
        assert!(thumbnail("12345678901234567890").is_some());
        assert!(thumbnail("123").is_none());
    }
}
