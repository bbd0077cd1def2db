use memberdb_core::db::open_db_in_memory;
use memberdb_core::{
    CrudRepository, Member, MemberRepository, RepoError, Team, TeamRepository, UnitOfWork,
};
use rusqlite::Connection;

fn seed_two_teams(conn: &mut Connection, members: &MemberRepository) {
    let teams = TeamRepository::register();
    let mut uow = UnitOfWork::begin(conn).unwrap();
    let team_a = teams.save(&mut uow, Team::new("teamA")).unwrap();
    let team_b = teams.save(&mut uow, Team::new("teamB")).unwrap();
    members
        .save(&mut uow, Member::with_team("member1", 10, &team_a))
        .unwrap();
    members
        .save(&mut uow, Member::with_team("member1", 20, &team_b))
        .unwrap();
    members
        .save(&mut uow, Member::with_team("member2", 30, &team_a))
        .unwrap();
    uow.commit().unwrap();
}

#[test]
fn lazy_query_defers_team_until_loaded() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    seed_two_teams(&mut conn, &members);
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let found = members.find_by_username(&mut uow, "member1").unwrap();
    assert_eq!(found.len(), 2);

    for member in &found {
        let team_ref = member.borrow().team().cloned().unwrap();
        assert!(!team_ref.is_loaded());
        assert!(matches!(
            team_ref.get(),
            Err(RepoError::AssociationUnavailable {
                association: "team",
                ..
            })
        ));

        let team = uow.load_team(member).unwrap().unwrap();
        assert!(team.borrow().name == "teamA" || team.borrow().name == "teamB");
        assert_eq!(team.id(), member.borrow().team_id());
        assert!(member.borrow().team().unwrap().is_loaded());
    }
}

#[test]
fn deferred_team_is_unavailable_after_commit() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    seed_two_teams(&mut conn, &members);

    let mut uow = UnitOfWork::begin(&mut conn).unwrap();
    let member = members
        .find_list_by_username(&mut uow, "member2")
        .unwrap()
        .remove(0);
    uow.commit().unwrap();

    let team_ref = member.borrow().team().cloned().unwrap();
    assert!(matches!(
        team_ref.get(),
        Err(RepoError::AssociationUnavailable { .. })
    ));

    let mut other = UnitOfWork::begin(&mut conn).unwrap();
    let err = other.load_team(&member).unwrap_err();
    assert!(matches!(err, RepoError::AssociationUnavailable { .. }));
}

#[test]
fn fetch_join_loads_teams_in_same_query() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    seed_two_teams(&mut conn, &members);
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let found = members.find_member_fetch_join(&mut uow).unwrap();
    assert_eq!(found.len(), 3);
    for member in &found {
        assert!(member.borrow().team().unwrap().is_loaded());
    }

    let team_of = |username: &str, age: i32| {
        found
            .iter()
            .find(|member| {
                let member = member.borrow();
                member.username == username && member.age == age
            })
            .and_then(|member| member.borrow().team().cloned())
            .unwrap()
            .get()
            .unwrap()
    };
    let first = team_of("member1", 10);
    let third = team_of("member2", 30);
    assert!(first.same_instance(&third));
    assert_eq!(first.borrow().name, "teamA");
    assert_eq!(uow.context().len(), 5);
}

#[test]
fn fetch_join_keeps_members_without_team() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    members.save(&mut uow, Member::with_age("loner", 10)).unwrap();
    uow.flush().unwrap();
    uow.clear();

    let found = members.find_member_fetch_join(&mut uow).unwrap();
    assert_eq!(found.len(), 1);
    assert!(found[0].borrow().team().is_none());
}

#[test]
fn entity_graph_query_attaches_team() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();
    seed_two_teams(&mut conn, &members);
    let mut uow = UnitOfWork::begin(&mut conn).unwrap();

    let found = members
        .find_entity_graph_by_username(&mut uow, "member1")
        .unwrap();
    assert_eq!(found.len(), 2);
    for member in &found {
        let team = member.borrow().team().unwrap().get().unwrap();
        assert_eq!(team.id(), member.borrow().team_id());
    }
}

#[test]
fn read_only_hint_skips_dirty_checking() {
    let mut conn = open_db_in_memory().unwrap();
    let members = MemberRepository::register(&conn).unwrap();

    let mut uow = UnitOfWork::begin(&mut conn).unwrap();
    members.save(&mut uow, Member::with_age("member1", 10)).unwrap();
    uow.flush().unwrap();
    uow.clear();

    let member = members
        .find_read_only_by_username(&mut uow, "member1")
        .unwrap()
        .unwrap();
    member.borrow_mut().username = "member2".to_string();
    let stats = uow.flush().unwrap();
    assert_eq!(stats.updated, 0);
    uow.commit().unwrap();

    let mut uow = UnitOfWork::begin(&mut conn).unwrap();
    assert!(members
        .find_optional_by_username(&mut uow, "member2")
        .unwrap()
        .is_none());
    assert!(members
        .find_optional_by_username(&mut uow, "member1")
        .unwrap()
        .is_some());
}
