//! End-to-end tests over the public service façade.

use std::path::Path;

use pms_core::{
    BmiClass, NewPatient, PatientService, PatientUpdate, PmsError, Referral,
};

fn service(dir: &Path) -> PatientService {
    PatientService::open(dir.join("patients.json"), dir.join("counter.txt"))
}

fn input(name: &str, email: &str, phone: &str, age: u32) -> NewPatient {
    NewPatient {
        name: name.into(),
        email: email.into(),
        phone: phone.into(),
        age,
        height: 1.75,
        weight: 70.0,
        allergies: None,
    }
}

#[test]
fn test_add_assigns_sequential_ids() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    for n in 1..=4u64 {
        let (id, _) = svc
            .add(input(
                &format!("P{n}"),
                &format!("p{n}@example.org"),
                &format!("{n}"),
                30,
            ))
            .unwrap();
        assert_eq!(id, n);
    }
}

#[test]
fn test_add_computes_derived_fields() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let (_, patient) = svc.add(input("John", "john@gmail.com", "1", 30)).unwrap();
    assert_eq!(patient.bmi, 22.86);
    assert_eq!(patient.bmi_class, BmiClass::NormalWeight);
    assert_eq!(patient.referred_by, Referral::Amateur);

    let (_, partner) = svc.add(input("Sara", "sara@parco.com.pk", "2", 28)).unwrap();
    assert_eq!(partner.referred_by, Referral::Company);

    let (_, pro) = svc.add(input("Omar", "omar@example.org", "3", 45)).unwrap();
    assert_eq!(pro.referred_by, Referral::Professional);
}

#[test]
fn test_duplicate_email_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    svc.add(input("A", "same@example.org", "1", 30)).unwrap();
    let err = svc.add(input("B", "same@example.org", "2", 40)).unwrap_err();
    assert!(matches!(err, PmsError::Duplicate { field: "email", .. }));
}

#[test]
fn test_duplicate_phone_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    svc.add(input("A", "a@example.org", "777", 30)).unwrap();
    let err = svc.add(input("B", "b@example.org", "777", 40)).unwrap_err();
    assert!(matches!(err, PmsError::Duplicate { field: "phone", .. }));
}

#[test]
fn test_update_to_own_email_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let (id, _) = svc.add(input("A", "a@example.org", "1", 30)).unwrap();
    // unchanged email plus a new weight must not collide with itself
    let updated = svc
        .update(
            id,
            PatientUpdate {
                email: Some("a@example.org".into()),
                weight: Some(80.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.weight, 80.0);
}

#[test]
fn test_update_merges_and_recomputes() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let (id, before) = svc.add(input("A", "a@gmail.com", "1", 30)).unwrap();
    assert_eq!(before.referred_by, Referral::Amateur);

    let after = svc
        .update(
            id,
            PatientUpdate {
                email: Some("a@parco.com.pk".into()),
                weight: Some(95.0),
                ..Default::default()
            },
        )
        .unwrap();

    // untouched fields survive, derived fields follow the new input
    assert_eq!(after.name, "A");
    assert_eq!(after.age, 30);
    assert_eq!(after.referred_by, Referral::Company);
    assert_eq!(after.bmi, 31.02); // 95 / 1.75^2
    assert_eq!(after.bmi_class, BmiClass::Obesity);

    let stored = svc.view_by_id(id).unwrap();
    assert_eq!(stored, after);
}

#[test]
fn test_update_missing_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let err = svc.update(99, PatientUpdate::default()).unwrap_err();
    assert!(matches!(err, PmsError::NotFound(_)));
}

#[test]
fn test_delete_then_view_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let (id, _) = svc.add(input("A", "a@example.org", "1", 30)).unwrap();
    svc.delete(id).unwrap();

    assert!(matches!(svc.view_by_id(id), Err(PmsError::NotFound(_))));
    assert!(matches!(svc.delete(id), Err(PmsError::NotFound(_))));
}

#[test]
fn test_deleted_ids_are_never_reused() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    svc.add(input("A", "a@example.org", "1", 30)).unwrap();
    let (second, _) = svc.add(input("B", "b@example.org", "2", 30)).unwrap();
    svc.delete(second).unwrap();

    let (third, _) = svc.add(input("C", "c@example.org", "3", 30)).unwrap();
    assert_eq!(third, 3);
    assert!(matches!(svc.view_by_id(second), Err(PmsError::NotFound(_))));
}

#[test]
fn test_view_all_empty_store_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    assert!(matches!(svc.view_all(None, None), Err(PmsError::NotFound(_))));
}

#[test]
fn test_view_all_sorts_by_age() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    svc.add(input("A", "a@example.org", "1", 30)).unwrap();
    svc.add(input("B", "b@example.org", "2", 10)).unwrap();
    svc.add(input("C", "c@example.org", "3", 20)).unwrap();

    let asc = svc.view_all(Some("age"), Some("asc")).unwrap();
    let ages: Vec<u32> = asc.iter().map(|(_, p)| p.age).collect();
    assert_eq!(ages, vec![10, 20, 30]);

    // desc is the exact reverse of asc, not an independent descending sort
    let desc = svc.view_all(Some("age"), Some("desc")).unwrap();
    let mut mirrored = asc;
    mirrored.reverse();
    assert_eq!(desc, mirrored);
}

#[test]
fn test_view_all_rejects_unknown_sort_key() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    svc.add(input("A", "a@example.org", "1", 30)).unwrap();

    assert!(matches!(
        svc.view_all(Some("favorite_color"), None),
        Err(PmsError::Validation(_))
    ));
    assert!(matches!(
        svc.view_all(Some("age"), Some("sideways")),
        Err(PmsError::Validation(_))
    ));
}

#[test]
fn test_validation_errors_surface_from_add() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let err = svc.add(input("A", "not-an-email", "1", 30)).unwrap_err();
    assert!(matches!(err, PmsError::Validation(_)));

    let err = svc.add(input("", "a@example.org", "1", 30)).unwrap_err();
    assert!(matches!(err, PmsError::Validation(_)));

    // nothing was stored
    assert!(matches!(svc.view_all(None, None), Err(PmsError::NotFound(_))));
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let svc = service(dir.path());
        svc.add(input("A", "a@example.org", "1", 30)).unwrap();
        svc.add(input("B", "b@example.org", "2", 40)).unwrap();
    }

    let reopened = service(dir.path());
    assert_eq!(reopened.view_by_id(1).unwrap().name, "A");
    assert_eq!(reopened.view_by_id(2).unwrap().name, "B");

    // the counter picks up where it left off
    let (id, _) = reopened.add(input("C", "c@example.org", "3", 50)).unwrap();
    assert_eq!(id, 3);
}

#[test]
fn test_corrupt_records_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("patients.json"), "garbage").unwrap();

    let svc = service(dir.path());
    assert!(matches!(svc.view_all(None, None), Err(PmsError::NotFound(_))));

    // and the store is writable again afterwards
    let (id, _) = svc.add(input("A", "a@example.org", "1", 30)).unwrap();
    assert_eq!(svc.view_by_id(id).unwrap().name, "A");
}

#[test]
fn test_failed_save_fails_the_operation_and_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let (id, _) = svc.add(input("A", "a@example.org", "1", 30)).unwrap();

    // make the records file unwritable by putting a directory in its place
    let records = dir.path().join("patients.json");
    std::fs::remove_file(&records).unwrap();
    std::fs::create_dir(&records).unwrap();

    let err = svc.add(input("B", "b@example.org", "2", 40)).unwrap_err();
    assert!(matches!(err, PmsError::Persistence(_)));

    let err = svc
        .update(
            id,
            PatientUpdate {
                age: Some(31),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, PmsError::Persistence(_)));

    let err = svc.delete(id).unwrap_err();
    assert!(matches!(err, PmsError::Persistence(_)));

    // in-memory state still reflects the last successful write
    assert_eq!(svc.view_by_id(id).unwrap().age, 30);
    let all = svc.view_all(None, None).unwrap();
    assert_eq!(all.len(), 1);
    assert!(matches!(svc.view_by_id(2), Err(PmsError::NotFound(_))));
}

#[test]
fn test_computation_error_keeps_context() {
    let err: PmsError = pms_core::models::compute_bmi(0.0, 70.0).unwrap_err().into();
    assert!(matches!(err, PmsError::Computation(_)));
    assert!(err.to_string().starts_with("cannot compute bmi"));
}

#[test]
fn test_allergies_kept_when_update_omits_them() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let mut i = input("A", "a@example.org", "1", 30);
    i.allergies = Some(vec!["pollen".into(), "penicillin".into()]);
    let (id, _) = svc.add(i).unwrap();

    let updated = svc
        .update(
            id,
            PatientUpdate {
                age: Some(31),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        updated.allergies,
        Some(vec!["pollen".into(), "penicillin".into()])
    );
}
