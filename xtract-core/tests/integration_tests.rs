//! End-to-end tests: load a `.xtd` definition, compile it, and run it
//! against an HTML document through the public API surface.

use xtract_core::{compile_bank, load_parser_defs, ContentType, ErrorPolicy, ParserBank};

fn compile_toml(toml: &str) -> ParserBank {
    let file: xtract_core::ParserDefFile = toml::from_str(toml).expect("valid toml");
    let compiled = compile_bank(&file).expect("should compile");
    ParserBank::new(compiled)
}

const PAGE: &str = r#"
<html>
  <head><title>Example Directory</title></head>
  <body>
    <ul id="people">
      <li><span class="name">Alice</span><a href="/bios/alice.html">bio</a></li>
      <li><span class="name">Bob</span><a href="/bios/bob.html">bio</a></li>
    </ul>
  </body>
</html>
"#;

#[test]
fn extracts_a_single_title_relation() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "titles"

        [[parser.query_defs]]
        name = "title"
        query = "//title"

        [[parser.relation_tmpls]]
        subject = "%url%"
        object = "%title%"
        predicate = "hasTitle"
        subject_cardinality = "one"
        object_cardinality = "one"
        "#,
    );

    let doc = bank
        .parse_document("http://x/dir.html", PAGE, ContentType::Html, ErrorPolicy::LogError)
        .unwrap();
    assert_eq!(doc.outputs.len(), 1);
    let relations = &doc.outputs[0].relations;
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].subject, "http://x/dir.html");
    assert_eq!(relations[0].object, "Example Directory");
    assert_eq!(relations[0].predicate, "hasTitle");
}

#[test]
fn grouped_query_aligns_name_and_bio_link_per_person() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "people"

        [[parser.query_group_defs]]
        name = "person"
        root_query = "//li"

        [[parser.query_group_defs.query_defs]]
        name = "person_name"
        query = "/span"

        [[parser.query_group_defs.query_defs]]
        name = "person_bio"
        query = "/a/@href"

        [[parser.relation_tmpls]]
        subject = "%person.person_name%"
        object = "%person.person_bio%"
        predicate = "hasBio"
        subject_cardinality = "many"
        object_cardinality = "many"
        "#,
    );

    let doc = bank
        .parse_document("http://x/dir.html", PAGE, ContentType::Html, ErrorPolicy::LogError)
        .unwrap();
    let relations = &doc.outputs[0].relations;
    assert_eq!(relations.len(), 2);
    assert_eq!(relations[0].subject, "Alice");
    assert_eq!(relations[0].object, "/bios/alice.html");
    assert_eq!(relations[1].subject, "Bob");
    assert_eq!(relations[1].object, "/bios/bob.html");
}

#[test]
fn url_absolutization_applies_to_href_queries() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "links"

        [[parser.query_defs]]
        name = "bio"
        query = "//a/@href"

        [[parser.relation_tmpls]]
        subject = "%url%"
        object = "%bio%"
        predicate = "linksTo"
        subject_cardinality = "one"
        object_cardinality = "many"
        "#,
    );

    let doc = bank
        .parse_document("http://x/dir/index.html", PAGE, ContentType::Html, ErrorPolicy::LogError)
        .unwrap();
    let relations = &doc.outputs[0].relations;
    assert_eq!(relations.len(), 2);
    assert_eq!(relations[0].object, "http://x/dir/bios/alice.html");
    assert_eq!(relations[1].object, "http://x/dir/bios/bob.html");
}

#[test]
fn inlined_xpath_reference_is_used_directly_without_a_named_query_def() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "links"

        [[parser.relation_tmpls]]
        subject = "http://x/p/"
        object = "/body/ul/li/a/@href"
        predicate = "linksTo"
        subject_cardinality = "one"
        object_cardinality = "many"
        "#,
    );

    let doc = bank
        .parse_document("http://x/dir/index.html", PAGE, ContentType::Html, ErrorPolicy::LogError)
        .unwrap();
    let relations = &doc.outputs[0].relations;
    assert_eq!(relations.len(), 2);
    assert_eq!(relations[0].subject, "http://x/p/");
    assert_eq!(relations[0].object, "http://x/dir/bios/alice.html");
    assert_eq!(relations[1].object, "http://x/dir/bios/bob.html");
}

#[test]
fn post_processing_ops_run_in_order() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "titles"

        [[parser.query_defs]]
        name = "title"
        query = "//title"

        [[parser.query_defs.post_processing_ops]]
        kind = "replace"
        regexp = "Example "
        rewrite = ""

        [[parser.relation_tmpls]]
        subject = "%url%"
        object = "%title%"
        predicate = "hasTitle"
        subject_cardinality = "one"
        object_cardinality = "one"
        "#,
    );

    let doc = bank
        .parse_document("http://x/dir.html", PAGE, ContentType::Html, ErrorPolicy::LogError)
        .unwrap();
    assert_eq!(doc.outputs[0].relations[0].object, "Directory");
}

#[test]
fn parser_with_non_matching_url_regexp_is_skipped() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "titles"
        url_regexp = "^http://other/"

        [[parser.query_defs]]
        name = "title"
        query = "//title"

        [[parser.relation_tmpls]]
        subject = "%url%"
        object = "%title%"
        predicate = "hasTitle"
        subject_cardinality = "one"
        object_cardinality = "one"
        "#,
    );

    let doc = bank
        .parse_document("http://x/dir.html", PAGE, ContentType::Html, ErrorPolicy::LogError)
        .unwrap();
    assert!(doc.outputs.is_empty());
}

#[test]
fn grouped_subquery_collision_is_logged_and_first_match_wins_under_log_error() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "people"

        [[parser.query_group_defs]]
        name = "person"
        root_query = "//li"

        [[parser.query_group_defs.query_defs]]
        name = "person_name"
        query = "/span[@class='k']"

        [[parser.relation_tmpls]]
        subject = "%url%"
        object = "%person.person_name%"
        predicate = "hasName"
        subject_cardinality = "one"
        object_cardinality = "many"
        "#,
    );
    let page =
        r#"<html><body><ul><li><span class="k">A</span><span class="k">B</span></li></ul></body></html>"#;

    let doc = bank.parse_document("http://x/", page, ContentType::Html, ErrorPolicy::LogError).unwrap();
    let relations = &doc.outputs[0].relations;
    assert_eq!(relations.len(), 1);
    assert_eq!(relations[0].object, "A");
}

#[test]
fn grouped_subquery_collision_aborts_under_abort_process() {
    let bank = compile_toml(
        r#"
        [[parser]]
        parser_name = "people"

        [[parser.query_group_defs]]
        name = "person"
        root_query = "//li"

        [[parser.query_group_defs.query_defs]]
        name = "person_name"
        query = "/span[@class='k']"

        [[parser.relation_tmpls]]
        subject = "%url%"
        object = "%person.person_name%"
        predicate = "hasName"
        subject_cardinality = "one"
        object_cardinality = "many"
        "#,
    );
    let page =
        r#"<html><body><ul><li><span class="k">A</span><span class="k">B</span></li></ul></body></html>"#;

    let result = bank.parse_document("http://x/", page, ContentType::Html, ErrorPolicy::AbortProcess);
    assert!(matches!(result, Err(xtract_core::RuntimeError::Aborted(_))));
}

#[test]
fn loader_merges_multiple_xtd_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("a.xtd"),
        "[[parser]]\nparser_name = \"a\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("b.xtd"),
        "[[parser]]\nparser_name = \"b\"\n",
    )
    .unwrap();

    let pattern = format!("{}/*.xtd", dir.path().display());
    let defs = load_parser_defs(&[pattern]).unwrap();
    assert_eq!(defs.len(), 2);
}
