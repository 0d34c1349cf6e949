//! Shared fixtures: a small movies graph written through the typed API

#![allow(dead_code)]

use viewbind::domains::movies::{
    ActorWrite, DirectorWrite, MovieWrite, NominationWrite, PersonWrite, RatingWrite, RoleWrite,
    DEFAULT_INSTANCE_SPACE as SPACE,
};
use viewbind::{ApplyOptions, DataModelClient, NodeId, Relation, Result};

/// Id in the movies instance space
pub fn id(external_id: &str) -> NodeId {
    NodeId::new(SPACE, external_id)
}

fn movie(xid: &str, title: &str, year: i64, minutes: f64, score: f64) -> MovieWrite {
    let mut movie = MovieWrite::new(SPACE, xid, title);
    movie.release_year = Some(year);
    movie.run_time_minutes = Some(minutes);
    movie.rating = Some(Relation::Entity(Box::new(RatingWrite::new(
        SPACE,
        &format!("rating:{}", xid.trim_start_matches("movie:")),
        score,
        1_000,
    ))));
    movie
}

fn actor(person: &str, movies: Vec<Relation<MovieWrite>>) -> ActorWrite {
    let mut actor = ActorWrite::new(SPACE, &format!("actor:{}", person));
    actor.person = Some(Relation::Id(id(&format!("person:{}", person))));
    actor.movies = movies;
    actor
}

/// Three people, two of Tarantino's movies and a Nolan film.
///
/// `person:quentin_tarantino` holds two roles (actor and director).
pub fn seed_movies(client: &DataModelClient) -> Result<()> {
    let pulp_fiction = movie("movie:pulp_fiction", "Pulp Fiction", 1994, 154.0, 8.9);
    let reservoir_dogs = movie("movie:reservoir_dogs", "Reservoir Dogs", 1992, 99.0, 8.3);
    let inception = movie("movie:inception", "Inception", 2010, 148.0, 8.8);

    let mut director = DirectorWrite::new(SPACE, "director:quentin_tarantino");
    director.person = Some(Relation::Id(id("person:quentin_tarantino")));
    director.won_oscar = Some(true);
    director.movies = vec![
        Relation::Entity(Box::new(pulp_fiction.clone())),
        Relation::Entity(Box::new(reservoir_dogs.clone())),
    ];
    director.nomination = vec![Relation::Entity(Box::new(NominationWrite::new(
        SPACE,
        "nomination:best_director_1995",
        "Best Director",
        Some(1995),
    )))];

    let mut quentin = PersonWrite::new(SPACE, "person:quentin_tarantino", "Quentin Tarantino");
    quentin.birth_year = Some(1963);
    quentin.roles = vec![
        Relation::Entity(Box::new(RoleWrite::from(actor(
            "quentin_tarantino",
            vec![Relation::Id(pulp_fiction.id.clone())],
        )))),
        Relation::Entity(Box::new(RoleWrite::from(director))),
    ];

    let mut uma = PersonWrite::new(SPACE, "person:uma_thurman", "Uma Thurman");
    uma.birth_year = Some(1970);
    uma.roles = vec![Relation::Entity(Box::new(RoleWrite::from(actor(
        "uma_thurman",
        vec![Relation::Id(pulp_fiction.id.clone())],
    ))))];

    let mut leonardo = PersonWrite::new(SPACE, "person:leonardo_dicaprio", "Leonardo DiCaprio");
    leonardo.birth_year = Some(1974);
    leonardo.roles = vec![Relation::Entity(Box::new(RoleWrite::from(actor(
        "leonardo_dicaprio",
        vec![Relation::Entity(Box::new(inception))],
    ))))];

    let movies = client.movies();
    movies
        .person
        .apply_many(&[quentin, uma, leonardo], ApplyOptions::default())?;

    // Movie-side edges, pointing back at the roles
    let mut pulp_fiction = pulp_fiction;
    pulp_fiction.actors = vec![
        Relation::Id(id("actor:quentin_tarantino")),
        Relation::Id(id("actor:uma_thurman")),
    ];
    pulp_fiction.directors = vec![Relation::Id(id("director:quentin_tarantino"))];
    pulp_fiction.rating = None;
    movies.movie.apply(&pulp_fiction, ApplyOptions::default())?;
    Ok(())
}
