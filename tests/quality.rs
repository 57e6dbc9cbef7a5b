// tests/quality.rs
use std::sync::Arc;

use chrono::Utc;
use community_events::credibility::CredibilityTable;
use community_events::event::{Event, EventSource, GENERIC_ORGANIZER, LOCATION_TBD};
use community_events::quality::{QualityBreakdown, QualityScorer, MAX_SCORE};
use community_events::relevance::{RelevanceScorer, Taxonomy};

const SOURCES: [EventSource; 8] = [
    EventSource::Search,
    EventSource::Scrape,
    EventSource::Feed,
    EventSource::Api,
    EventSource::AdminQuickAdd,
    EventSource::CommunitySubmission,
    EventSource::Manual,
    EventSource::Unknown,
];

fn raw_sum(b: &QualityBreakdown) -> u16 {
    [
        b.title,
        b.description,
        b.date,
        b.location,
        b.organizer,
        b.source_url,
        b.price,
        b.tags,
        b.credibility,
    ]
    .iter()
    .map(|&p| p as u16)
    .sum()
}

/// Variants from bare to complete, for one source kind.
fn spread(source: EventSource) -> Vec<Event> {
    let now = Utc::now();
    let mut out = Vec::new();

    let bare = Event::new("Meetup", source, "", now);
    out.push(bare.clone());

    out.push(Event {
        date_is_placeholder: true,
        location: LOCATION_TBD.into(),
        organizer: Some(GENERIC_ORGANIZER.into()),
        price: Some("TBA".into()),
        ..bare.clone()
    });

    let mut full = Event::new(
        "Trans Swim Social at the Lido",
        source,
        "https://listings.test/swim",
        now,
    );
    full.description =
        "A relaxed evening swim for trans and non-binary people, with changing space reserved.".into();
    full.location = "London Fields Lido, London".into();
    full.organizer = Some("Swim Together".into());
    full.price = Some("£5".into());
    out.push(full.clone());

    // relevance hits land as tags
    let mut tagged = full.clone();
    RelevanceScorer::new(Arc::new(Taxonomy::default_seed())).tag(&mut tagged);
    out.push(tagged);

    out.push(Event {
        date_is_placeholder: true,
        location: "Online".into(),
        ..full
    });
    out
}

#[test]
fn score_is_bounded_and_sums_its_components() {
    let scorer = QualityScorer::new(Arc::new(CredibilityTable::default_seed()))
        .with_taxonomy(Arc::new(Taxonomy::default_seed()));

    for source in SOURCES {
        for ev in spread(source) {
            let b = scorer.breakdown(&ev);
            let score = scorer.score(&ev);
            assert!(score <= MAX_SCORE, "{source:?} {:?} scored {score}", ev.title);
            assert_eq!(score, b.total());
            assert_eq!(score as u16, raw_sum(&b).min(MAX_SCORE as u16), "{source:?} {b:?}");
        }
    }
}

#[test]
fn every_signal_moves_the_score_up() {
    let scorer = QualityScorer::new(Arc::new(CredibilityTable::default_seed()));
    let events = spread(EventSource::CommunitySubmission);
    let (bare, placeholders, full) = (&events[0], &events[1], &events[2]);

    // only the date separates these two: placeholders earn nothing
    assert_eq!(scorer.breakdown(placeholders).date, 0);
    assert_eq!(scorer.score(placeholders) + 15, scorer.score(bare));
    assert!(scorer.score(full) > scorer.score(bare));

    let b = scorer.breakdown(full);
    assert!(b.title > 0 && b.description > 0 && b.location > 0 && b.price > 0);
    assert_eq!(raw_sum(&b), b.total() as u16, "full community event stays under the cap");
}
