// tests/extractor.rs
use community_events::ingest::extract::{markdown_titles, search_results, MAX_SCRAPED_PER_PAGE};

#[test]
fn scenario_a_single_search_result_yields_one_candidate() {
    let text = "[1] Title: Black Queer Social\n[1] URL Source: http://x.test/e1\n[1] Description: A community gathering for queer people of colour.";
    let out: Vec<_> = search_results(text).collect();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].title, "Black Queer Social");
    assert_eq!(out[0].url, "http://x.test/e1");
    assert_eq!(
        out[0].description,
        "A community gathering for queer people of colour."
    );
}

#[test]
fn never_emits_a_record_missing_a_field() {
    let inputs = [
        "",
        "no markers at all, just prose about a lovely queer picnic in the park",
        "[1] Title: Only A Title Here With Enough Padding To Pass The Length Check",
        "[1] URL Source: https://x.test/only-url\n[1] Description: and a description, but no title line",
        "[3] Title: \n[3] URL Source: https://x.test/blank-title\n[3] Description: blank title value",
        "[1] Title: Good One\n[1] URL Source: https://x.test/ok\n[1] Description: complete listing for the night\n[2] Title: Broken\n[2] Description: missing its url field entirely here",
    ];
    for text in inputs {
        for rec in search_results(text) {
            assert!(!rec.title.is_empty(), "{text:?}");
            assert!(!rec.url.is_empty(), "{text:?}");
            assert!(!rec.description.is_empty(), "{text:?}");
        }
    }
}

#[test]
fn multi_line_description_keeps_first_line_only() {
    let text = "[1] Title: Healing Circle for QTIPOC\n[1] URL Source: https://x.test/h\n[1] Description: First line only\nsecond line is ignored\n";
    let out: Vec<_> = search_results(text).collect();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].description, "First line only");
}

#[test]
fn dropped_segments_are_counted() {
    let text = "[1] Title: Complete Listing For Poetry\n[1] URL Source: https://x.test/1\n[1] Description: words and more words\n[2] Title: Incomplete Listing With No Url\n[2] Description: this one is missing the url\n";
    let mut it = search_results(text);
    let got: Vec<_> = it.by_ref().collect();
    assert_eq!(got.len(), 1);
    assert_eq!(it.dropped(), 1);
}

#[test]
fn markdown_scan_prefers_headings_then_bold_then_links() {
    let md = "# Trans Joy Picnic in the Park\n\nSome text with **Black Queer Book Club** inside.\n\n[QTIPOC Film Night at the Rio](https://rio.test/e/1)\n";
    let titles = markdown_titles(md);
    assert_eq!(titles.len(), 3);
    assert_eq!(titles[0].title, "Trans Joy Picnic in the Park");
    assert_eq!(titles[1].title, "Black Queer Book Club");
    assert_eq!(titles[2].url.as_deref(), Some("https://rio.test/e/1"));
}

#[test]
fn markdown_scan_is_capped_per_page() {
    let md: String = (0..25)
        .map(|i| format!("## Community Event Number {i}\n"))
        .collect();
    assert_eq!(markdown_titles(&md).len(), MAX_SCRAPED_PER_PAGE);
}

#[test]
fn inline_bracketed_number_is_not_a_segment_boundary() {
    let text = "[1] Title: Black Queer Book Club\n\
                [1] URL Source: https://books.test/club\n\
                [1] Description: We discuss the novel cited in [2] the reading list and share snacks in London.\n\
                [2] Title: Trans Swim Social Evening\n\
                [2] URL Source: https://x.test/swim\n\
                [2] Description: Evening swim for trans and non-binary folk.\n";
    let out: Vec<_> = search_results(text).collect();
    assert_eq!(out.len(), 2);
    assert_eq!(
        out[0].description,
        "We discuss the novel cited in [2] the reading list and share snacks in London."
    );
    assert!(out[1].raw_content.starts_with("[2] Title: Trans Swim Social Evening"));
}
