//! PubMed E-utilities literature source: esearch to find matching PMIDs,
//! then efetch to pull their abstracts, over a plain `reqwest::Client`.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{LiteratureItem, LiteratureSource, SourceError};

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

pub struct PubMedSource {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl PubMedSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key }
    }

    async fn esearch(&self, query: &str, max: usize) -> Result<Vec<String>, SourceError> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("retmode", "json".to_string()),
            ("term", query.to_string()),
            ("retmax", max.to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let response: serde_json::Value =
            self.client.get(ESEARCH_URL).query(&params).send().await?.json().await?;

        Ok(response["esearchresult"]["idlist"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect())
    }

    async fn efetch_abstracts(&self, pmids: &[String]) -> Result<Vec<LiteratureItem>, SourceError> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("rettype", "abstract".to_string()),
            ("retmode", "xml".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let xml = self.client.get(EFETCH_URL).query(&params).send().await?.text().await?;
        parse_pubmed_xml(&xml)
    }
}

#[async_trait]
impl LiteratureSource for PubMedSource {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<LiteratureItem>, SourceError> {
        let pmids = self.esearch(query, max_results).await?;
        self.efetch_abstracts(&pmids).await
    }
}

/// Minimal streaming XML scan over PubmedArticleSet, pulling PMID, title,
/// and abstract text.
fn parse_pubmed_xml(xml: &str) -> Result<Vec<LiteratureItem>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current_pmid = String::new();
    let mut current_title = String::new();
    let mut current_abstract = String::new();
    let mut in_pmid = false;
    let mut in_title = false;
    let mut in_abstract = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| SourceError::BadResponse(e.to_string()))? {
            Event::Start(e) => match e.name().as_ref() {
                b"PMID" => in_pmid = true,
                b"ArticleTitle" => in_title = true,
                b"AbstractText" => in_abstract = true,
                _ => {}
            },
            Event::Text(t) => {
                let text = t.unescape().unwrap_or_default().into_owned();
                if in_pmid && current_pmid.is_empty() {
                    current_pmid = text;
                } else if in_title {
                    current_title.push_str(&text);
                } else if in_abstract {
                    if !current_abstract.is_empty() {
                        current_abstract.push(' ');
                    }
                    current_abstract.push_str(&text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"PMID" => in_pmid = false,
                b"ArticleTitle" => in_title = false,
                b"AbstractText" => in_abstract = false,
                b"PubmedArticle" => {
                    items.push(LiteratureItem {
                        external_id: std::mem::take(&mut current_pmid),
                        title: std::mem::take(&mut current_title),
                        abstract_text: std::mem::take(&mut current_abstract),
                    });
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_single_article() {
        let xml = r#"<PubmedArticleSet><PubmedArticle>
            <PMID>12345</PMID>
            <ArticleTitle>KRAS in pancreatic cancer</ArticleTitle>
            <AbstractText>The patient presented with acute pancreatitis.</AbstractText>
        </PubmedArticle></PubmedArticleSet>"#;
        let items = parse_pubmed_xml(xml).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].external_id, "12345");
        assert!(items[0].abstract_text.contains("pancreatitis"));
    }
}
