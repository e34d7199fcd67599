/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::server::protocol::Request;
use crate::server::protocol::Response;
use crate::server::protocol::TypeQuery;
use crate::test::util::server_with_files;
use crate::test::util::TestServer;

fn query(t: &mut TestServer, q: TypeQuery) -> String {
    match t.process(Request::TypeQuery(q)) {
        Some(Response::TypeQuery(text)) => text,
        other => panic!("expected a type-query response, got {other:?}"),
    }
}

const CLASSES: &str = "\
class Animal:
    name: str = ''
    def speak(self) -> str:
        return ''

class Dog(Animal):
    breed: str = ''
    def fetch(self, distance: int) -> bool:
        return True

class Cat(Animal):
    pass
";

#[test]
fn test_less_or_equal() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    assert_eq!(
        query(
            &mut t,
            TypeQuery::LessOrEqual("int".to_owned(), "object".to_owned())
        ),
        "true"
    );
    assert_eq!(
        query(
            &mut t,
            TypeQuery::LessOrEqual("int".to_owned(), "str".to_owned())
        ),
        "false"
    );
    let unknown = query(
        &mut t,
        TypeQuery::LessOrEqual("Foo".to_owned(), "object".to_owned()),
    );
    assert!(unknown.starts_with("Error: Type "));
    assert_eq!(
        unknown,
        "Error: Type `Foo` was not found in the type order."
    );
}

#[test]
fn test_join_and_meet() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    assert_eq!(
        query(&mut t, TypeQuery::Join("Dog".to_owned(), "Cat".to_owned())),
        "Animal"
    );
    assert_eq!(
        query(&mut t, TypeQuery::Meet("Dog".to_owned(), "Animal".to_owned())),
        "Dog"
    );
    assert_eq!(
        query(&mut t, TypeQuery::Meet("Dog".to_owned(), "Cat".to_owned())),
        "typing.NoReturn"
    );
    assert_eq!(
        query(&mut t, TypeQuery::Join("bool".to_owned(), "int".to_owned())),
        "int"
    );
}

#[test]
fn test_superclasses() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    assert_eq!(
        query(&mut t, TypeQuery::Superclasses("Dog".to_owned())),
        "Animal, object"
    );
}

#[test]
fn test_attributes_include_inherited() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    assert_eq!(
        query(&mut t, TypeQuery::Attributes("Dog".to_owned())),
        "breed: str\nname: str"
    );
}

#[test]
fn test_methods_format() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    assert_eq!(
        query(&mut t, TypeQuery::Methods("Dog".to_owned())),
        "fetch: (self, int) -> bool\nspeak: (self) -> str"
    );
}

#[test]
fn test_missing_class_error_strings_keep_their_asymmetry() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    // `int` is in the type order but carries no class definition.
    assert_eq!(
        query(&mut t, TypeQuery::Attributes("int".to_owned())),
        "Error: No class definition found for int"
    );
    assert_eq!(
        query(&mut t, TypeQuery::Methods("int".to_owned())),
        "Error: No class definition found for int"
    );
    assert_eq!(
        query(&mut t, TypeQuery::Superclasses("int".to_owned())),
        "No class definition found for int"
    );
}

#[test]
fn test_untracked_type_for_every_query_kind() {
    let mut t = server_with_files(&[]);
    let expected = "Error: Type `Ghost` was not found in the type order.";
    assert_eq!(query(&mut t, TypeQuery::Attributes("Ghost".to_owned())), expected);
    assert_eq!(query(&mut t, TypeQuery::Methods("Ghost".to_owned())), expected);
    assert_eq!(query(&mut t, TypeQuery::Superclasses("Ghost".to_owned())), expected);
    assert_eq!(
        query(&mut t, TypeQuery::NormalizeType("Ghost".to_owned())),
        expected
    );
}

#[test]
fn test_normalize_type() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    assert_eq!(query(&mut t, TypeQuery::NormalizeType(" Dog ".to_owned())), "Dog");
    assert_eq!(query(&mut t, TypeQuery::NormalizeType("None".to_owned())), "None");
}

#[test]
fn test_type_at_location() {
    let mut t = server_with_files(&[("a.py", "x = 42\ny = x\n")]);
    assert_eq!(
        query(
            &mut t,
            TypeQuery::TypeAtLocation {
                path: "a.py".to_owned(),
                line: 2,
                column: 4,
            }
        ),
        "int"
    );
    assert_eq!(
        query(
            &mut t,
            TypeQuery::TypeAtLocation {
                path: "missing.py".to_owned(),
                line: 3,
                column: 7,
            }
        ),
        "Error: Not able to get lookup at missing.py:3:7"
    );
}

#[test]
fn test_attribute_queries_reuse_the_memo() {
    let mut t = server_with_files(&[("zoo.py", CLASSES)]);
    query(&mut t, TypeQuery::Attributes("Dog".to_owned()));
    assert!(t
        .server
        .state()
        .heap
        .memoized_class_attributes("Dog")
        .is_some());
    // A recheck clears the process-wide memo before repopulating.
    t.type_check(&["zoo.py"], &["zoo.py"]);
    assert!(t
        .server
        .state()
        .heap
        .memoized_class_attributes("Dog")
        .is_none());
}
