use memberdb_core::db::open_db_in_memory;
use memberdb_core::{CrudRepository, Member, MemberRepository, UnitOfWork};

#[test]
fn bulk_age_plus_counts_rows_and_leaves_loaded_member_stale() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for (username, age) in [
        ("member1", 10),
        ("member2", 19),
        ("member3", 20),
        ("member4", 21),
        ("member5", 40),
    ] {
        members.save(&mut uow, Member::with_age(username, age)).unwrap();
    }

    let member5 = members
        .find_member_by_username(&mut uow, "member5")
        .unwrap()
        .unwrap();

    let result_count = members.bulk_age_plus(&mut uow, 20).unwrap();
    assert_eq!(result_count, 3);

    assert_eq!(member5.borrow().age, 40);
    let again = members
        .find_member_by_username(&mut uow, "member5")
        .unwrap()
        .unwrap();
    assert!(again.same_instance(&member5));
    assert_eq!(again.borrow().age, 40);

    uow.clear();
    let fresh = members
        .find_member_by_username(&mut uow, "member5")
        .unwrap()
        .unwrap();
    assert!(!fresh.same_instance(&member5));
    assert_eq!(fresh.borrow().age, 41);

    let untouched = members
        .find_member_by_username(&mut uow, "member2")
        .unwrap()
        .unwrap();
    assert_eq!(untouched.borrow().age, 19);
}

#[test]
fn bulk_update_sees_members_saved_earlier_in_unit_of_work() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    members.save(&mut uow, Member::with_age("member1", 30)).unwrap();

    assert_eq!(members.bulk_age_plus(&mut uow, 20).unwrap(), 1);
    assert_eq!(members.bulk_age_plus(&mut uow, 100).unwrap(), 0);
}
