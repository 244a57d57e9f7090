use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

pub const UNKNOWN_DEPARTMENT: &str = "Unknown";

/// Link texts that point at a posting but are not its title.
const GENERIC_LINK_TEXT: [&str; 3] = ["View Details", "Bookmark", "Apply"];

/// A posting found on the search results page, before its detail page is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLink {
    pub job_id: String,
    pub title: String,
    pub link: String,
}

/// Collects posting links from a search results page.
///
/// Only `/postings/<digits>` links count. Duplicate ids keep the longest
/// title and the position where the id was first seen.
pub fn parse_posting_links(html: &str, page_url: &str, limit: usize) -> Result<Vec<PostingLink>> {
    let base = Url::parse(page_url).with_context(|| format!("Invalid page URL {}", page_url))?;
    let id_re = Regex::new(r"/postings/(\d+)/?$")?;
    let document = Html::parse_document(html);
    let Some(selector) = Selector::parse("a[href*='/postings/']").ok() else {
        return Ok(Vec::new());
    };

    let mut links: Vec<PostingLink> = Vec::new();
    for element in document.select(&selector) {
        let href = element.value().attr("href").unwrap_or("");
        let Ok(url) = base.join(href) else {
            continue;
        };
        let Some(job_id) = id_re.captures(url.path()).map(|c| c[1].to_string()) else {
            continue;
        };

        let title = element_text(element);
        if title.is_empty() || GENERIC_LINK_TEXT.iter().any(|g| title.contains(g)) {
            continue;
        }

        match links.iter_mut().find(|l| l.job_id == job_id) {
            Some(existing) => {
                if title.len() > existing.title.len() {
                    existing.title = title;
                    existing.link = url.to_string();
                }
            }
            None => links.push(PostingLink {
                job_id,
                title,
                link: url.to_string(),
            }),
        }
    }

    links.truncate(limit);
    Ok(links)
}

/// Department from a detail page: a table row labelled "Department"
/// (value in the second cell) or a list item with a `span.value`.
pub fn parse_department(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let rows = Selector::parse("tr").ok()?;
    let value_cell = Selector::parse("td:nth-child(2)").ok()?;
    for row in document.select(&rows) {
        if !element_text(row).contains("Department") {
            continue;
        }
        if let Some(cell) = row.select(&value_cell).next() {
            let value = element_text(cell);
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    let items = Selector::parse("li").ok()?;
    let value_span = Selector::parse("span.value").ok()?;
    for item in document.select(&items) {
        if !element_text(item).contains("Department") {
            continue;
        }
        if let Some(span) = item.select(&value_span).next() {
            let value = element_text(span);
            if !value.is_empty() {
                return Some(value);
            }
        }
    }

    None
}

/// Visible text of an element with whitespace runs collapsed.
fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_URL: &str = "https://www.ubjobs.buffalo.edu/postings/search";

    const RESULTS: &str = r#"
        <html><body>
          <div class="job-item">
            <h3><a href="/postings/101">Data Analyst</a></h3>
            <a href="/postings/101">View Details</a>
            <a href="/postings/101/bookmark">Bookmark</a>
          </div>
          <div class="job-item">
            <a href="/postings/102">Research</a>
            <h3><a href="/postings/102">Research Scientist,
                Chemical Engineering</a></h3>
          </div>
          <div class="job-item">
            <a href="https://www.ubjobs.buffalo.edu/postings/103">Program Coordinator</a>
            <a href="/postings/103/apply">Apply for this Job</a>
          </div>
          <a href="/postings/search?page=2">Next</a>
          <a href="/postings/abc">Not a posting</a>
        </body></html>
    "#;

    #[test]
    fn test_parse_posting_links() {
        let links = parse_posting_links(RESULTS, SEARCH_URL, 10).unwrap();
        let ids: Vec<&str> = links.iter().map(|l| l.job_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "102", "103"]);

        assert_eq!(links[0].title, "Data Analyst");
        assert_eq!(links[0].link, "https://www.ubjobs.buffalo.edu/postings/101");
        // longer title wins, first-seen position kept
        assert_eq!(links[1].title, "Research Scientist, Chemical Engineering");
        assert_eq!(links[2].title, "Program Coordinator");
    }

    #[test]
    fn test_parse_posting_links_limit() {
        let links = parse_posting_links(RESULTS, SEARCH_URL, 2).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].job_id, "102");

        assert!(parse_posting_links(RESULTS, SEARCH_URL, 0).unwrap().is_empty());
    }

    #[test]
    fn test_parse_posting_links_skips_generic_text() {
        let html = r#"<a href="/postings/5">View Details</a><a href="/postings/6"> </a>"#;
        assert!(parse_posting_links(html, SEARCH_URL, 10).unwrap().is_empty());
    }

    #[test]
    fn test_parse_posting_links_bad_base() {
        assert!(parse_posting_links(RESULTS, "not a url", 10).is_err());
    }

    #[test]
    fn test_parse_department_from_table() {
        let html = r#"
            <table>
              <tr><th>Position Title</th><td>Data Analyst</td></tr>
              <tr><th>Department</th><td>
                  School of Management</td></tr>
            </table>"#;
        assert_eq!(parse_department(html).as_deref(), Some("School of Management"));
    }

    #[test]
    fn test_parse_department_from_list() {
        let html = r#"
            <ul>
              <li><span class="label">Campus</span><span class="value">North</span></li>
              <li><span class="label">Department</span><span class="value">Libraries</span></li>
            </ul>"#;
        assert_eq!(parse_department(html).as_deref(), Some("Libraries"));
    }

    #[test]
    fn test_parse_department_missing() {
        assert_eq!(parse_department("<p>Department of nothing</p>"), None);
        assert_eq!(parse_department(""), None);
    }
}
