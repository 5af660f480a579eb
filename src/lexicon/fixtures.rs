//! Sample lexicon around the verb "accept"
//!
//! Small enough to read, rich enough to exercise every tier: two confusables,
//! two antonyms, one related sense, a spelling look-alike, a sibling sense of the
//! same word, and a band of unrelated verbs plus off-POS and off-band noise.
//! Used by the CLI demo mode, the benchmarks and the test suites.

use super::InMemoryLexicon;
use crate::types::{ConfusedRelation, PartOfSpeech, Relationships, Sense, SenseId};

pub fn accept_sense_id() -> SenseId {
    SenseId::from("accept.v.01")
}

fn sense(
    id: &str,
    word: &str,
    pos: PartOfSpeech,
    rank: u32,
    definition: &str,
    example: Option<&str>,
) -> Sense {
    Sense {
        id: id.into(),
        word: word.into(),
        pos,
        frequency_rank: rank,
        definition: definition.into(),
        example_sentence: example.map(str::to_string),
        relationships: Relationships::default(),
        sibling_senses: vec![],
    }
}

/// The "accept" world
pub fn sample_lexicon() -> InMemoryLexicon {
    use PartOfSpeech::*;

    let mut accept = sense(
        "accept.v.01",
        "accept",
        Verb,
        900,
        "receive willingly something given or offered",
        Some("She decided to accept the job offer."),
    );
    accept.relationships = Relationships {
        confused: vec![
            ConfusedRelation {
                sense_id: "except.v.01".into(),
                reason: "sound-alike".into(),
            },
            ConfusedRelation {
                sense_id: "expect.v.01".into(),
                reason: "look-alike".into(),
            },
        ],
        opposite: vec!["refuse.v.01".into(), "reject.v.01".into()],
        related: vec!["receive.v.01".into()],
        morphological: vec!["acceptance.n.01".into()],
    };
    accept.sibling_senses = vec!["accept.v.02".into()];

    let mut accept_true = sense(
        "accept.v.02",
        "accept",
        Verb,
        1100,
        "consider or hold as true",
        Some("I cannot accept his explanation."),
    );
    accept_true.sibling_senses = vec!["accept.v.01".into()];

    let senses = vec![
        accept,
        accept_true,
        sense(
            "except.v.01",
            "except",
            Verb,
            4800,
            "take out of a group or leave out of consideration",
            Some("The rule excepts children under five."),
        ),
        sense(
            "expect.v.01",
            "expect",
            Verb,
            600,
            "regard something as likely to happen",
            Some("We expect rain later today."),
        ),
        sense(
            "refuse.v.01",
            "refuse",
            Verb,
            1300,
            "show unwillingness towards a request",
            Some("He refused to sign the contract."),
        ),
        sense(
            "reject.v.01",
            "reject",
            Verb,
            1500,
            "dismiss as inadequate or not to one's taste",
            Some("The editor rejected the manuscript."),
        ),
        sense(
            "receive.v.01",
            "receive",
            Verb,
            700,
            "get something; come into possession of",
            Some("She received a letter from her aunt."),
        ),
        sense(
            "access.v.01",
            "access",
            Verb,
            1700,
            "obtain or retrieve data from a computer",
            Some("You can access the files remotely."),
        ),
        sense(
            "acceptance.n.01",
            "acceptance",
            Noun,
            2100,
            "the act of accepting with approval",
            None,
        ),
        // Band fillers within 500 ranks of "accept"
        sense("borrow.v.01", "borrow", Verb, 950, "get temporarily from a lender", None),
        sense("deliver.v.01", "deliver", Verb, 820, "bring to a destination or hand over", None),
        sense("gather.v.01", "gather", Verb, 760, "assemble people or things in one place", None),
        sense("obtain.v.01", "obtain", Verb, 1010, "come into possession of through effort", None),
        sense("grant.v.01", "grant", Verb, 1050, "allow to have as a special privilege", None),
        sense("admit.v.01", "admit", Verb, 640, "declare to be true, often reluctantly", None),
        sense("adopt.v.01", "adopt", Verb, 1150, "take up and practice as one's own", None),
        sense("welcome.v.01", "welcome", Verb, 880, "greet the arrival of a guest warmly", None),
        sense("embrace.v.01", "embrace", Verb, 1250, "squeeze someone tightly in one's arms", None),
        sense("permit.v.01", "permit", Verb, 990, "consent to or authorize officially", None),
        sense("decline.v.01", "decline", Verb, 1200, "go down in value or amount", None),
        sense("approve.v.01", "approve", Verb, 780, "judge to be good or satisfactory", None),
        sense("tolerate.v.01", "tolerate", Verb, 1390, "put up with something unpleasant", None),
        sense("collect.v.01", "collect", Verb, 560, "call for and pick up", None),
        sense("agree.v.01", "agree", Verb, 430, "be of the same opinion", None),
        // Noise the filters must drop
        sense("offer.n.01", "offer", Noun, 910, "a proposal put forward for acceptance", None),
        sense("gratitude.n.01", "gratitude", Noun, 1020, "a feeling of thankfulness", None),
        sense("acquiesce.v.01", "acquiesce", Verb, 9500, "comply without protest", None),
    ];

    InMemoryLexicon::from_senses(senses)
}
