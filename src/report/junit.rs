//! JUnit XML rendering of a report suite.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::{format_percent, TestCase, TestSuite};
use crate::error::Result;

const ROOT_NAME: &str = "vrc";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_case(writer: &mut XmlWriter, case: &TestCase) -> Result<()> {
    let mut start = BytesStart::new("testcase");
    start.push_attribute(("name", case.name.as_str()));
    start.push_attribute(("classname", case.classname()));
    start.push_attribute(("time", "0"));
    writer.write_event(Event::Start(start))?;

    writer.write_event(Event::Start(BytesStart::new("properties")))?;
    let mismatch = format_percent(case.mismatch);
    for (name, value) in [("mismatch", mismatch.as_str()), ("tag", case.tag.as_str())] {
        let mut property = BytesStart::new("property");
        property.push_attribute(("name", name));
        property.push_attribute(("value", value));
        writer.write_event(Event::Empty(property))?;
    }
    writer.write_event(Event::End(BytesEnd::new("properties")))?;

    if let Some(failure) = &case.failure {
        let mut start = BytesStart::new("failure");
        start.push_attribute(("message", failure.message.as_str()));
        start.push_attribute(("type", case.classname()));
        writer.write_event(Event::Start(start))?;
        writer.write_event(Event::Text(BytesText::new(&failure.body)))?;
        writer.write_event(Event::End(BytesEnd::new("failure")))?;
    }

    let mut output = String::new();
    if let Some(log) = &case.output {
        output.push_str(log);
        output.push('\n');
    }
    for path in &case.attachments {
        output.push_str(&format!("[[ATTACHMENT|{}]]\n", path.display()));
    }
    if !output.is_empty() {
        text_element(writer, "system-out", &output)?;
    }

    writer.write_event(Event::End(BytesEnd::new("testcase")))?;
    Ok(())
}

/// Renders one suite as a `<testsuites>` document.
pub fn render_suite(suite: &TestSuite) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let tests = suite.cases.len().to_string();
    let failures = suite.failures().to_string();

    let mut root = BytesStart::new("testsuites");
    root.push_attribute(("name", ROOT_NAME));
    root.push_attribute(("tests", tests.as_str()));
    root.push_attribute(("failures", failures.as_str()));
    writer.write_event(Event::Start(root))?;

    let mut start = BytesStart::new("testsuite");
    start.push_attribute(("name", suite.name.as_str()));
    start.push_attribute(("tests", tests.as_str()));
    start.push_attribute(("failures", failures.as_str()));
    start.push_attribute(("errors", "0"));
    start.push_attribute(("skipped", "0"));
    writer.write_event(Event::Start(start))?;
    for case in &suite.cases {
        write_case(&mut writer, case)?;
    }
    writer.write_event(Event::End(BytesEnd::new("testsuite")))?;
    writer.write_event(Event::End(BytesEnd::new("testsuites")))?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn write_suite(path: &Path, suite: &TestSuite) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_suite(suite)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_outcomes;
    use crate::report::{build_suites, SUITE_BODY, SUITE_IGNORED};

    fn rendered(name: &str) -> String {
        let suites = build_suites(&sample_outcomes());
        let suite = suites.iter().find(|s| s.name == name).unwrap();
        render_suite(suite).unwrap()
    }

    #[test]
    fn body_suite_counts_and_classnames() {
        let xml = rendered(SUITE_BODY);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<testsuite name=\"body\" tests=\"4\" failures=\"3\""));
        assert!(xml.contains("name=\"/clean\" classname=\"perfect-match\""));
        assert!(xml.contains("classname=\"redirect-url-mismatch\""));
        assert!(xml.contains("<property name=\"mismatch\" value=\"0.00\"/>"));
        assert!(xml.contains("<property name=\"tag\" value=\"critical-diff\"/>"));
        assert!(xml.contains("[[ATTACHMENT|diffs/page/001.png]]"));
        assert!(xml.contains("timed out after 150s"));
    }

    #[test]
    fn ignored_cases_pass() {
        let xml = rendered(SUITE_IGNORED);
        assert!(xml.contains("tests=\"1\" failures=\"0\""));
        assert!(xml.contains("classname=\"ignored-diff\""));
        assert!(!xml.contains("<failure"));
    }

    #[test]
    fn special_characters_are_escaped() {
        let suite = TestSuite {
            name: "body".into(),
            cases: vec![TestCase {
                failure: Some(crate::report::CaseFailure {
                    message: "a < b".into(),
                    body: "x & y".into(),
                }),
                ..TestCase::new("/search?q=\"a\"&b", crate::severity::SeverityTag::MinorDiff, Some(0.5))
            }],
        };
        let xml = render_suite(&suite).unwrap();
        assert!(xml.contains("/search?q=&quot;a&quot;&amp;b"));
        assert!(xml.contains("message=\"a &lt; b\""));
        assert!(xml.contains("x &amp; y"));
    }
}
