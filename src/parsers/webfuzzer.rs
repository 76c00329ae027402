//! Webfuzzer text report parser.
//!
//! The report is loosely delimited text: a `Scan of host:port [uri] (ip)`
//! header, an optional server header block, then one `(GET|POST): ... ]--`
//! block per finding. Fields are recovered by positional regex capture.
//! Every finding is a web finding on the single scanned service.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::errors::AppError;
use crate::models::host::HostRecord;
use crate::models::item::{ReportItem, WebEvidence};
use crate::models::severity::Severity;
use crate::parsers::{ParseResult, Parser};

/// Detail name under which the server header block is kept.
pub const SERVER_HEADER_DETAIL: &str = "server-header";

/// Parser for Webfuzzer text output.
#[derive(Debug, Default)]
pub struct WebfuzzerParser;

impl WebfuzzerParser {
    pub fn new() -> Self {
        Self
    }
}

struct Patterns {
    header: Regex,
    server: Regex,
    finding: Regex,
    body: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            header: Regex::new(r"Scan of ([\w.]+):(\d+) \[([/\w]+)\] \(([\w.]+)\)")?,
            server: Regex::new(r"Server header:\n\n([\s\S]+)\n\n\n")?,
            finding: Regex::new(r"\((POST|GET)\): ([\s\S]*?) \]--")?,
            body: Regex::new(r"^([\s\S]+)\(([\s\S]+)\)\n--\[ ([\s\S]+)$")?,
        })
    }
}

impl Parser for WebfuzzerParser {
    fn parse(&self, data: &[u8]) -> ParseResult {
        let patterns = match Patterns::compile() {
            Ok(patterns) => patterns,
            Err(e) => return ParseResult::malformed(self.source_tool(), true, e),
        };
        let text = String::from_utf8_lossy(data).replace("\r\n", "\n");

        let Some(header) = patterns.header.captures(&text) else {
            return ParseResult::malformed(self.source_tool(), true, "missing 'Scan of' header");
        };
        let hostname = header[1].to_string();
        let port = header[2].to_string();
        let uri = header[3].to_string();
        let ip = header[4].to_string();

        let mut host = HostRecord::builder(ip.clone())
            .hostname(hostname.clone())
            .detail("uri", uri);
        if let Some(server) = patterns.server.captures(&text) {
            host = host.detail(SERVER_HEADER_DETAIL, server[1].to_string());
        }

        let mut result = ParseResult::new(self.source_tool(), true);
        result.hosts.insert(host.build());

        for (i, finding) in patterns.finding.captures_iter(&text).enumerate() {
            let method = finding[1].to_string();
            let Some(body) = patterns.body.captures(&finding[2]) else {
                result.skip(i, AppError::missing("url", format!("{method} finding #{i}")));
                continue;
            };

            result.items.push(ReportItem {
                host: ip.clone(),
                subnet: ip.clone(),
                raw_port: format!("{port}/tcp"),
                protocol: "tcp".to_string(),
                port: Some(port.clone()),
                service: port.clone(),
                severity: None,
                name: body[1].trim().to_string(),
                website: Some(hostname.clone()),
                web: Some(WebEvidence {
                    path: body[2].to_string(),
                    method,
                    response: body[3].to_string(),
                }),
                ..ReportItem::default()
            });
        }

        tracing::debug!(
            host = %ip,
            items = result.items.len(),
            skipped = result.errors.len(),
            "Parsed Webfuzzer report"
        );
        result
    }

    fn source_tool(&self) -> &str {
        "Webfuzzer"
    }

    fn map_severity(&self, tool_severity: &str) -> Severity {
        Severity::from_label(tool_severity)
    }
}

/// Where webfuzzer writes its report for a given command line.
///
/// The tool names its output after the target passed with `-G` or `-P`,
/// e.g. `webfuzzer -G www.example.com -x` writes `<dir>/www.example.com.txt`.
pub fn report_path_for(dir: &Path, command: &str) -> Option<PathBuf> {
    let target = Regex::new(r"-([GP]) ([\w.\-]+)").ok()?;
    let captures = target.captures(command)?;
    Some(dir.join(format!("{}.txt", &captures[2])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_fixture() -> ParseResult {
        let data = include_bytes!("../../tests/fixtures/webfuzzer_sample.txt");
        WebfuzzerParser::new().parse(data)
    }

    #[test]
    fn extracts_scan_header() {
        let result = parse_fixture();
        assert_eq!(result.hosts.len(), 1);
        let host = result.hosts.get("10.30.0.5").unwrap();
        assert_eq!(host.hostnames(), ["testphp.example"]);
        assert_eq!(host.details().first("uri"), Some("/app"));
        assert_eq!(
            host.details().first(SERVER_HEADER_DETAIL),
            Some("Apache/2.4.41 (Ubuntu)\nX-Powered-By: PHP/7.4.3")
        );
    }

    #[test]
    fn extracts_findings_positionally() {
        let result = parse_fixture();
        assert_eq!(result.items.len(), 2);

        let sql = &result.items[0];
        assert_eq!(sql.name, "SQL error found");
        assert_eq!(sql.port.as_deref(), Some("80"));
        assert_eq!(sql.service, "80");
        let web = sql.web.as_ref().unwrap();
        assert_eq!(web.method, "GET");
        assert_eq!(web.path, "http://testphp.example/artists.php?artist=1'");
        assert_eq!(
            web.response,
            "Warning: mysql_fetch_array() expects parameter 1 to be resource"
        );

        let xss = &result.items[1];
        assert_eq!(xss.web.as_ref().unwrap().method, "POST");
        assert_eq!(xss.website.as_deref(), Some("testphp.example"));
    }

    #[test]
    fn body_without_url_is_skipped() {
        let result = parse_fixture();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].record_index, Some(2));
        assert!(result.errors[0].error.is_missing_field());
    }

    #[test]
    fn server_header_runs_to_last_blank_block() {
        let data = b"Scan of intranet.test:8080 [/] (10.30.0.9)\n\n\
Server header:\n\nnginx\n\n\nVia: proxy\n\n\nDone.\n";
        let result = WebfuzzerParser::new().parse(data);
        let host = result.hosts.get("10.30.0.9").unwrap();
        assert_eq!(
            host.details().first(SERVER_HEADER_DETAIL),
            Some("nginx\n\n\nVia: proxy")
        );
    }

    #[test]
    fn missing_header_is_malformed() {
        let result = WebfuzzerParser::new().parse(b"Could not reach target\n");
        assert!(result.is_malformed());
        assert!(result.hosts.is_empty());
    }

    #[test]
    fn report_path_follows_target() {
        let path = report_path_for(Path::new("/tmp/out"), "webfuzzer -G www.example.com -x");
        assert_eq!(path, Some(PathBuf::from("/tmp/out/www.example.com.txt")));
        assert_eq!(report_path_for(Path::new("/tmp"), "webfuzzer -x"), None);
    }
}
