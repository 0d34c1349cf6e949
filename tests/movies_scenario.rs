//! End-to-end use of the movies model against the in-memory backend

mod common;

use common::{id, seed_movies};
use viewbind::domains::movies::{
    Actor, ActorFilter, Director, DirectorFilter, Movie, MovieFilter, Nomination,
    NominationFilter, Person, PersonFilter, PersonWrite, Rating, RatingFilter,
    DEFAULT_INSTANCE_SPACE as SPACE,
};
use viewbind::filter::CommonFilter;
use viewbind::instances::{AggregatedValue, Aggregation, SortDirection};
use viewbind::{ApplyOptions, DataModelClient, Entity, Error, ListOptions, Match};

fn client() -> DataModelClient {
    let client = DataModelClient::in_memory();
    seed_movies(&client).unwrap();
    client
}

#[test]
fn test_retrieve_known_person_has_two_roles() {
    let client = client();
    let person = client
        .movies()
        .person
        .retrieve("person:quentin_tarantino")
        .unwrap()
        .expect("seeded person");

    assert_eq!(person.name, "Quentin Tarantino");
    assert_eq!(person.birth_year, Some(1963));
    assert_eq!(person.roles.len(), 2);
    assert!(person.roles.contains(&id("actor:quentin_tarantino")));
    assert!(person.roles.contains(&id("director:quentin_tarantino")));
}

#[test]
fn test_retrieve_many_and_unknown() {
    let people = client().movies().person;

    let found = people
        .retrieve_many(&["person:quentin_tarantino", "person:uma_thurman"])
        .unwrap();
    assert_eq!(found.len(), 2);

    assert!(people.retrieve("person:nobody").unwrap().is_none());
    let partial = people
        .retrieve_many(&["person:nobody", "person:uma_thurman"])
        .unwrap();
    assert_eq!(partial.len(), 1);
}

#[test]
fn test_apply_then_delete_leaves_nothing() {
    let people = client().movies().person;
    let filter = PersonFilter {
        common: CommonFilter {
            external_id_prefix: Some("person:new_".into()),
            ..Default::default()
        },
        ..Default::default()
    };

    let result = people
        .apply(
            &PersonWrite::new(SPACE, "person:new_face", "New Face"),
            ApplyOptions::default(),
        )
        .unwrap();
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(people.list(&filter, None).unwrap().len(), 1);

    let deleted = people.delete(&["person:new_face"]).unwrap();
    assert_eq!(deleted, vec![id("person:new_face")]);
    assert_eq!(people.list(&filter, None).unwrap().len(), 0);

    // Deleting again is a no-op
    assert!(people.delete(&["person:new_face"]).unwrap().is_empty());
}

#[test]
fn test_list_filters_and_sort() {
    let movies = client().movies();

    let born_early = movies
        .person
        .list(
            &PersonFilter {
                max_birth_year: Some(1970),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(born_early.len(), 2);

    let by_name = movies
        .person
        .list(
            &PersonFilter {
                name: Some(Match::Many(vec!["Uma Thurman".into(), "Leonardo DiCaprio".into()])),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(by_name.len(), 2);

    let newest_first = movies
        .movie
        .list_with(
            &MovieFilter::default(),
            ListOptions::default().sort_by("releaseYear", SortDirection::Descending),
        )
        .unwrap();
    let titles: Vec<&str> = newest_first.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Inception", "Pulp Fiction", "Reservoir Dogs"]);

    let err = movies
        .movie
        .list_with(
            &MovieFilter::default(),
            ListOptions::default().sort_by("actors", SortDirection::Ascending),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_edges_attached_on_both_sides() {
    let movies = client().movies();

    let pulp = movies.movie.retrieve("movie:pulp_fiction").unwrap().unwrap();
    assert_eq!(pulp.actors.len(), 2);
    assert_eq!(pulp.directors, vec![id("director:quentin_tarantino")]);
    assert_eq!(pulp.rating, Some(id("rating:pulp_fiction")));

    let director = movies
        .director
        .retrieve("director:quentin_tarantino")
        .unwrap()
        .unwrap();
    assert_eq!(director.won_oscar, Some(true));
    assert_eq!(director.movies.len(), 2);
    assert_eq!(director.nomination, vec![id("nomination:best_director_1995")]);
    assert_eq!(director.person, Some(id("person:quentin_tarantino")));
}

#[test]
fn test_related_lists() {
    let movies = client().movies();
    let people = movies.person.list(&PersonFilter::default(), None).unwrap();
    let actors = movies.actor.list(&ActorFilter::default(), None).unwrap();
    assert_eq!(people.role_ids().len(), 4);

    let people_actors = people.related("roles", &actors);
    assert_eq!(people_actors.len(), 3);

    let movie_ids = actors.movie_ids();
    assert_eq!(movie_ids.len(), 2);
    assert_eq!(people.as_write().len(), people.len());
}

#[test]
fn test_query_traversal() {
    let movies = client().movies();

    let query = movies.person.query(
        &PersonFilter {
            name_prefix: Some("Quentin".into()),
            ..Default::default()
        },
        None,
    );
    assert_eq!(query.step_count(), 1);

    let to_directors = query
        .traverse::<Director>("roles", &DirectorFilter::default(), None)
        .unwrap();
    assert_eq!(to_directors.step_count(), 3);

    let to_movies = to_directors
        .traverse::<Movie>("movies", &MovieFilter::default(), None)
        .unwrap();
    assert_eq!(to_movies.step_count(), 5);

    let mut titles: Vec<String> = to_movies
        .list()
        .unwrap()
        .into_iter()
        .map(|m| m.title)
        .collect();
    titles.sort();
    assert_eq!(titles, vec!["Pulp Fiction", "Reservoir Dogs"]);
}

#[test]
fn test_query_direct_relation_and_errors() {
    let movies = client().movies();

    let ratings = movies
        .movie
        .query(
            &MovieFilter {
                min_release_year: Some(2000),
                ..Default::default()
            },
            None,
        )
        .traverse::<Rating>("rating", &RatingFilter::default(), None)
        .unwrap()
        .list()
        .unwrap();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings.iter().next().unwrap().score, Some(8.8));

    let scalar = movies
        .movie
        .query(&MovieFilter::default(), None)
        .traverse::<Rating>("title", &RatingFilter::default(), None)
        .unwrap_err();
    assert!(matches!(scalar, Error::TypeMismatch { .. }));

    let wrong_target = movies
        .director
        .query(&DirectorFilter::default(), None)
        .traverse::<Nomination>("movies", &NominationFilter::default(), None)
        .unwrap_err();
    assert!(matches!(wrong_target, Error::TypeMismatch { .. }));

    let unknown = movies
        .actor
        .query(&ActorFilter::default(), None)
        .traverse::<Movie>("films", &MovieFilter::default(), None)
        .unwrap_err();
    assert!(matches!(unknown, Error::Validation(_)));
}

#[test]
fn test_search_and_aggregate() {
    let movies = client().movies();

    let hits = movies
        .movie
        .search("pulp", Some(&["title"]), &MovieFilter::default(), None)
        .unwrap();
    assert_eq!(hits.len(), 1);

    let groups = movies
        .movie
        .aggregate(
            &[
                Aggregation::Count {
                    property: "title".into(),
                },
                Aggregation::Max {
                    property: "runTimeMinutes".into(),
                },
            ],
            &[],
            &MovieFilter::default(),
        )
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert!(matches!(groups[0].aggregates[0], AggregatedValue::Count { value: 3, .. }));
    assert!(matches!(
        groups[0].aggregates[1],
        AggregatedValue::Max { value: Some(v), .. } if v == 154.0
    ));

    let buckets = movies
        .movie
        .histogram("releaseYear", 10.0, &MovieFilter::default())
        .unwrap();
    let counts: Vec<(f64, i64)> = buckets.iter().map(|b| (b.start, b.count)).collect();
    assert_eq!(counts, vec![(1990.0, 2), (2010.0, 1)]);

    let err = movies
        .movie
        .aggregate(
            &[Aggregation::Sum {
                property: "budget".into(),
            }],
            &[],
            &MovieFilter::default(),
        )
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[test]
fn test_version_conflict_propagates() {
    let people = client().movies().person;
    let mut stale = people
        .retrieve("person:uma_thurman")
        .unwrap()
        .unwrap()
        .as_write();
    stale.existing_version = Some(stale.existing_version.unwrap_or(0) + 5);
    stale.birth_year = Some(1971);

    let err = people.apply(&stale, ApplyOptions::default()).unwrap_err();
    assert!(err.is_version_conflict());

    let forced = people
        .apply(
            &stale,
            ApplyOptions {
                allow_version_increase: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(forced.nodes[0].version, 2);
    assert!(forced.nodes[0].was_modified);
}

#[test]
fn test_filter_by_reference() {
    let movies = client().movies();
    let roles = movies
        .actor
        .list(
            &ActorFilter {
                person: Some(Match::One(id("person:uma_thurman"))),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    let ids: Vec<_> = roles.ids();
    assert_eq!(ids, vec![id("actor:uma_thurman")]);

    let actor: &Actor = roles.iter().next().unwrap();
    assert_eq!(actor.movies, vec![id("movie:pulp_fiction")]);
}
