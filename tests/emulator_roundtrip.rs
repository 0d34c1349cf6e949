//! The HTTP backend against a live emulator on an ephemeral port

mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use common::{id, seed_movies};
use viewbind::api::{serve, AppState};
use viewbind::domains::movies::{MovieFilter, PersonFilter};
use viewbind::{DataModelClient, Error, MemoryInstances};

/// Start an emulator on its own runtime and return its address
fn emulator() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let state = AppState::new(Arc::new(MemoryInstances::new()));
            serve(listener, state, std::future::pending()).await.unwrap();
        });
    });
    addr
}

fn client_with_token(addr: SocketAddr) -> DataModelClient {
    DataModelClient::from_toml(&format!(
        r#"
        [client]
        project = "movies-demo"
        base_url = "http://{}"

        [credentials]
        token = "test"
        "#,
        addr
    ))
    .unwrap()
}

#[test]
fn test_seed_and_read_over_http() {
    let addr = emulator();
    let client = client_with_token(addr);
    seed_movies(&client).unwrap();
    let movies = client.movies();

    let quentin = movies
        .person
        .retrieve("person:quentin_tarantino")
        .unwrap()
        .expect("seeded person");
    assert_eq!(quentin.roles.len(), 2);

    let pulp = movies.movie.retrieve("movie:pulp_fiction").unwrap().unwrap();
    assert_eq!(pulp.rating, Some(id("rating:pulp_fiction")));
    assert_eq!(pulp.directors, vec![id("director:quentin_tarantino")]);

    let early = movies
        .movie
        .list(
            &MovieFilter {
                max_release_year: Some(2000),
                ..Default::default()
            },
            None,
        )
        .unwrap();
    assert_eq!(early.len(), 2);
}

#[test]
fn test_query_and_delete_over_http() {
    let addr = emulator();
    let client = client_with_token(addr);
    seed_movies(&client).unwrap();
    let movies = client.movies();

    let titles: Vec<String> = movies
        .person
        .query(
            &PersonFilter {
                name_prefix: Some("Uma".into()),
                ..Default::default()
            },
            None,
        )
        .traverse::<viewbind::domains::movies::Actor>("roles", &Default::default(), None)
        .unwrap()
        .traverse::<viewbind::domains::movies::Movie>("movies", &MovieFilter::default(), None)
        .unwrap()
        .list()
        .unwrap()
        .into_iter()
        .map(|m| m.title)
        .collect();
    assert_eq!(titles, vec!["Pulp Fiction"]);

    let deleted = movies.movie.delete(&["movie:inception"]).unwrap();
    assert_eq!(deleted, vec![id("movie:inception")]);
    assert!(movies.movie.retrieve("movie:inception").unwrap().is_none());
}

#[test]
fn test_client_credentials_against_token_route() {
    let addr = emulator();
    let client = DataModelClient::from_toml(&format!(
        r#"
        [client]
        project = "movies-demo"
        base_url = "http://{addr}"

        [credentials]
        client_id = "local"
        client_secret = "secret"
        token_url = "http://{addr}/oauth2/token"
        "#,
        addr = addr
    ))
    .unwrap();

    let people = client.movies().person;
    assert!(people.list(&PersonFilter::default(), None).unwrap().is_empty());
}

#[test]
fn test_unreachable_service_is_a_transport_error() {
    let client = DataModelClient::from_toml(
        r#"
        [client]
        project = "movies-demo"
        base_url = "http://127.0.0.1:1"

        [credentials]
        token = "test"
        "#,
    )
    .unwrap();

    let err = client
        .movies()
        .person
        .retrieve("person:anyone")
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
