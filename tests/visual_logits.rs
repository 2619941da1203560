use idcard_check::{engine::visual_from_logits, signals::Label};

const CLASSES: [Label; 3] = [Label::Genuine, Label::Fake, Label::Suspicious];

#[test]
fn argmax_maps_through_class_order() {
    let v = visual_from_logits(&[0.1, 3.0, 0.2], &CLASSES).unwrap();
    assert_eq!(v.predicted_class, Label::Fake);
    assert!(v.confidence > 0.85 && v.confidence < 1.0);

    let reordered = [Label::Suspicious, Label::Genuine, Label::Fake];
    let v = visual_from_logits(&[0.1, 3.0, 0.2], &reordered).unwrap();
    assert_eq!(v.predicted_class, Label::Genuine);
}

#[test]
fn softmax_is_stable_for_large_scores() {
    let v = visual_from_logits(&[1000.0, 999.0, -1000.0], &CLASSES).unwrap();
    assert_eq!(v.predicted_class, Label::Genuine);
    let expected = 1.0 / (1.0 + (-1.0f64).exp());
    assert!((v.confidence - expected).abs() < 1e-9);
}

#[test]
fn ties_go_to_the_first_class() {
    let v = visual_from_logits(&[2.0, 2.0, 2.0], &CLASSES).unwrap();
    assert_eq!(v.predicted_class, Label::Genuine);
    assert!((v.confidence - 1.0 / 3.0).abs() < 1e-9);
}

#[test]
fn malformed_scores_are_errors() {
    assert!(visual_from_logits(&[1.0, 2.0], &CLASSES).is_err());
    assert!(visual_from_logits(&[1.0, f64::NAN, 0.0], &CLASSES).is_err());
    assert!(visual_from_logits(&[], &[]).is_err());
}
