use idcard_check::roster::Roster;

fn roster(partial: bool) -> Roster {
    Roster::from_names(
        ["VelTech Engineering College", "Anna University", "IIT Madras"],
        partial,
    )
    .expect("roster")
}

#[test]
fn exact_names_match_after_normalization() {
    let r = roster(false);
    assert!(r.is_approved(Some("VelTech Engineering College")));
    assert!(r.is_approved(Some("  veltech   ENGINEERING college. ")));
    assert!(r.is_approved(Some("Anna-University")));
    assert_eq!(r.lookup(Some("iit, madras")), Some("IIT Madras"));
}

#[test]
fn fullwidth_text_is_folded() {
    let r = roster(false);
    assert!(r.is_approved(Some("ＡＮＮＡ ＵＮＩＶＥＲＳＩＴＹ")));
}

#[test]
fn blank_or_missing_names_are_never_approved() {
    let r = roster(true);
    assert!(!r.is_approved(None));
    assert!(!r.is_approved(Some("")));
    assert!(!r.is_approved(Some("  ...  ")));
}

#[test]
fn partial_match_is_word_aligned() {
    let r = roster(true);
    assert!(r.is_approved(Some("VelTech Engineering College, Chennai - 600062")));
    assert!(!r.is_approved(Some("Tech")));
    assert!(!r.is_approved(Some("Annauniversity")));

    let strict = roster(false);
    assert!(!strict.is_approved(Some("VelTech Engineering College, Chennai")));
}

#[test]
fn unknown_institution_is_rejected() {
    assert!(!roster(true).is_approved(Some("Hogwarts School of Witchcraft")));
}

#[test]
fn duplicates_and_blanks_are_dropped() {
    let r = Roster::from_names(["Anna University", "anna university", "  "], true).unwrap();
    assert_eq!(r.len(), 1);
    assert_eq!(r.names().collect::<Vec<_>>(), vec!["Anna University"]);
}

#[test]
fn empty_roster_is_an_error() {
    assert!(Roster::from_names(Vec::<String>::new(), true).is_err());
    assert!(Roster::from_names([" ", "--"], true).is_err());
}
