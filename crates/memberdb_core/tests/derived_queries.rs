use memberdb_core::db::open_db_in_memory;
use memberdb_core::{
    CrudRepository, DerivedQuery, Member, MemberRepository, Operator, QueryParam, QuerySpec,
    RegistrationError, RepoError, UnitOfWork,
};

#[test]
fn username_and_age_greater_than_returns_only_older_member() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    members.save(&mut uow, Member::with_age("aaa", 10)).unwrap();
    members.save(&mut uow, Member::with_age("aaa", 20)).unwrap();

    let result = members
        .find_by_username_and_age_greater_than(&mut uow, "aaa", 15)
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].borrow().username, "aaa");
    assert_eq!(result[0].borrow().age, 20);
}

#[test]
fn username_and_age_matches_exactly() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    members.save(&mut uow, Member::with_age("memberA", 10)).unwrap();
    members.save(&mut uow, Member::with_age("memberA", 11)).unwrap();

    let found = members
        .find_by_username_and_age(&mut uow, "memberA", 10)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].borrow().age, 10);
}

#[test]
fn return_shapes_cover_list_single_and_optional() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let aaa = members.save(&mut uow, Member::with_age("aaa", 10)).unwrap();
    members.save(&mut uow, Member::with_age("bbb", 20)).unwrap();

    let list = members.find_list_by_username(&mut uow, "aaa").unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].same_instance(&aaa));

    let single = members.find_member_by_username(&mut uow, "aaa").unwrap();
    assert!(single.unwrap().same_instance(&aaa));

    let optional = members.find_optional_by_username(&mut uow, "aaa").unwrap();
    assert!(optional.is_some());

    assert!(members
        .find_list_by_username(&mut uow, "unknown")
        .unwrap()
        .is_empty());
    assert!(members
        .find_member_by_username(&mut uow, "unknown")
        .unwrap()
        .is_none());
    assert!(members
        .find_optional_by_username(&mut uow, "unknown")
        .unwrap()
        .is_none());
}

#[test]
fn single_result_with_duplicates_is_non_unique() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    members.save(&mut uow, Member::with_age("aaa", 10)).unwrap();
    members.save(&mut uow, Member::with_age("aaa", 20)).unwrap();

    let err = members.find_optional_by_username(&mut uow, "aaa").unwrap_err();
    assert!(matches!(err, RepoError::NonUniqueResult { .. }));
}

#[test]
fn count_by_age_counts_matching_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for (username, age) in [("member1", 10), ("member2", 10), ("member3", 20)] {
        members.save(&mut uow, Member::with_age(username, age)).unwrap();
    }

    assert_eq!(members.count_by_age(&mut uow, 10).unwrap(), 2);
    assert_eq!(members.count_by_age(&mut uow, 30).unwrap(), 0);
}

#[test]
fn top_n_with_static_order_limits_sorted_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for index in 1..=5 {
        members
            .save(&mut uow, Member::with_age(format!("member{index}"), 10))
            .unwrap();
    }

    let top3 =
        DerivedQuery::<Member>::from_method_name("findTop3ByAgeOrderByUsernameDesc").unwrap();
    let usernames = top3
        .list(&mut uow, &[10.into()])
        .unwrap()
        .iter()
        .map(|member| member.borrow().username.clone())
        .collect::<Vec<_>>();
    assert_eq!(usernames, vec!["member5", "member4", "member3"]);

    let first = DerivedQuery::<Member>::from_method_name("findFirstByAgeOrderByUsernameAsc")
        .unwrap()
        .list(&mut uow, &[10.into()])
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].borrow().username, "member1");
}

#[test]
fn exists_and_range_operators_evaluate_predicates() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    for (username, age) in [("member1", 10), ("member2", 20), ("member3", 30)] {
        members.save(&mut uow, Member::with_age(username, age)).unwrap();
    }

    let exists = DerivedQuery::<Member>::from_method_name("existsByUsername").unwrap();
    assert!(exists.exists(&mut uow, &["member2".into()]).unwrap());
    assert!(!exists.exists(&mut uow, &["member9".into()]).unwrap());

    let between = DerivedQuery::<Member>::compile(
        "ageBetween",
        QuerySpec::find()
            .and("age", Operator::GreaterThanEqual)
            .and("age", Operator::LessThan),
    )
    .unwrap();
    let found = between.list(&mut uow, &[10.into(), 30.into()]).unwrap();
    assert_eq!(found.len(), 2);

    let by_names = DerivedQuery::<Member>::from_method_name("findByUsernameIn").unwrap();
    let found = by_names
        .list(&mut uow, &[QueryParam::list(["member1", "member3"])])
        .unwrap();
    assert_eq!(found.len(), 2);
    let none = by_names
        .list(&mut uow, &[QueryParam::list(Vec::<&str>::new())])
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn unknown_property_fails_before_any_call() {
    let err = DerivedQuery::<Member>::from_method_name("findByNickname").unwrap_err();
    match err {
        RegistrationError::UnknownField { entity, field, .. } => {
            assert_eq!(entity, "Member");
            assert_eq!(field, "nickname");
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = DerivedQuery::<Member>::from_method_name("deleteByUsername").unwrap_err();
    assert!(matches!(err, RegistrationError::InvalidMethodName { .. }));
}

#[test]
fn wrong_argument_count_is_a_call_error() {
    let mut conn = open_db_in_memory().unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let query =
        DerivedQuery::<Member>::from_method_name("findByUsernameAndAgeGreaterThan").unwrap();
    assert_eq!(query.arity(), 2);
    let err = query.list(&mut uow, &["aaa".into()]).unwrap_err();
    assert!(matches!(
        err,
        RepoError::ParameterCount {
            expected: 2,
            actual: 1,
            ..
        }
    ));
}
