// Bringup - STM32F4 Board Bring-up Harness
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Artifact writers: JSON results, snapshots and JUnit XML for CI.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::error;

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Best-effort pretty JSON write. Failures are logged, never fatal.
pub fn write_json<T: Serialize>(path: &Path, value: &T) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Failed to create directory {:?}: {}", parent, e);
                return;
            }
        }
    }
    match std::fs::File::create(path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, value) {
                error!("Failed to write {:?}: {}", path, e);
            }
        }
        Err(e) => error!("Failed to create {:?}: {}", path, e),
    }
}

pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseStatus {
    Passed,
    Failed(String),
    Errored(String),
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct JunitCase {
    pub name: String,
    pub status: CaseStatus,
    /// Extra text placed inside the failure/error element.
    pub details: Option<String>,
}

pub fn render_junit_xml(
    suite: &str,
    cases: &[JunitCase],
    properties: &[(&str, String)],
    duration: Duration,
) -> String {
    let time_secs = duration.as_secs_f64();
    let mut failures = 0;
    let mut errors = 0;
    let mut skipped = 0;

    let mut testcases = String::new();
    for case in cases {
        testcases.push_str(&format!(
            "  <testcase classname=\"{}\" name=\"{}\" time=\"0.000000\">\n",
            xml_escape(suite),
            xml_escape(&case.name)
        ));
        let body = case.details.as_deref().unwrap_or_default();
        match &case.status {
            CaseStatus::Passed => {}
            CaseStatus::Failed(msg) => {
                failures += 1;
                testcases.push_str(&format!(
                    "    <failure message=\"{}\">{}</failure>\n",
                    xml_escape(msg),
                    xml_escape(body)
                ));
            }
            CaseStatus::Errored(msg) => {
                errors += 1;
                testcases.push_str(&format!(
                    "    <error message=\"{}\">{}</error>\n",
                    xml_escape(msg),
                    xml_escape(body)
                ));
            }
            CaseStatus::Skipped(msg) => {
                skipped += 1;
                testcases.push_str(&format!(
                    "    <skipped message=\"{}\"/>\n",
                    xml_escape(msg)
                ));
            }
        }
        testcases.push_str("  </testcase>\n");
    }

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<testsuite name="{}" tests="{}" failures="{}" errors="{}" skipped="{}" time="{:.6}">"#,
        xml_escape(suite),
        cases.len(),
        failures,
        errors,
        skipped,
        time_secs
    ));
    xml.push('\n');
    if !properties.is_empty() {
        xml.push_str("  <properties>\n");
        for (name, value) in properties {
            xml.push_str(&format!(
                "    <property name=\"{}\" value=\"{}\"/>\n",
                xml_escape(name),
                xml_escape(value)
            ));
        }
        xml.push_str("  </properties>\n");
    }
    xml.push_str(&testcases);
    xml.push_str("</testsuite>\n");
    xml
}

pub fn write_junit_xml(
    path: &Path,
    suite: &str,
    cases: &[JunitCase],
    properties: &[(&str, String)],
    duration: Duration,
) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                error!("Failed to create directory {:?}: {}", parent, e);
                return;
            }
        }
    }
    let xml = render_junit_xml(suite, cases, properties, duration);
    if let Err(e) = std::fs::write(path, xml) {
        error!("Failed to write JUnit report {:?}: {}", path, e);
    }
}
