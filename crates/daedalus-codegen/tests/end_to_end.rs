//! Compile controllers, load the units in memory and run them.

use daedalus_codegen::{CompileError, CompiledController, RouteCompiler};
use daedalus_model::{
    names, AttributeValue, ControllerDescriptor, HttpVerb, MethodDescriptor, MethodRef,
    ParamDescriptor, PrimitiveKind, TypeRef,
};
use daedalus_test::{
    ControllerStub, Loader, Machine, RecordedRoute, RecordingRouter, SyntheticContext, Value,
    NO_CONTENT,
};

const PETS: &str = "app.PetController";

fn method(name: &str, verb: HttpVerb, pattern: &str) -> daedalus_model::MethodDescriptorBuilder {
    MethodDescriptor::builder(PETS, name).verb(verb).pattern(pattern)
}

fn compile(controller: &ControllerDescriptor) -> CompiledController {
    RouteCompiler::default()
        .compile_controller(controller)
        .unwrap_or_else(|e| panic!("compilation failed: {e}"))
}

fn link(compiled: &CompiledController, loader: Loader) -> Machine {
    let mut loader = loader;
    loader.load_all(compiled.units()).unwrap();
    loader.link().unwrap()
}

/// Compiles, links and installs `controller`, returning the machine and the
/// recorded routes.
fn install(
    controller: &ControllerDescriptor,
    stub: &ControllerStub,
    loader: Loader,
) -> (Machine, RecordingRouter) {
    let compiled = compile(controller);
    let machine = link(&compiled, loader);
    let router = RecordingRouter::new();
    machine
        .install(&compiled.registration.name, stub.provider(), &router)
        .unwrap();
    (machine, router)
}

fn route(router: &RecordingRouter, verb: &str, pattern: &str) -> RecordedRoute {
    router
        .find(verb, pattern)
        .unwrap_or_else(|| panic!("no route {verb} {pattern}"))
}

#[test]
fn test_get_pet_by_id() {
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("getPet", HttpVerb::Get, "/pets/{id}")
            .param(ParamDescriptor::path("id", TypeRef::int()))
            .returns(TypeRef::class("app.Pet"))
            .build(),
    );
    let compiled = compile(&controller);
    assert_eq!(compiled.handlers.len(), 1);

    let stub = ControllerStub::new(PETS).on("getPet", |args| {
        Ok(Value::record("app.Pet", [("id", args[0].clone())]))
    });
    let (machine, router) = install(&controller, &stub, Loader::new());

    assert_eq!(router.routes().len(), 1);
    let route = route(&router, "GET", "/pets/{id}");
    assert_eq!(route.return_type(), Some(Value::Class("app.Pet".into())));

    let ctx = SyntheticContext::builder().path("id", "7").build();
    let pet = machine.dispatch(route.handler(), &ctx).unwrap();
    assert_eq!(pet, Value::record("app.Pet", [("id", Value::Int(7))]));
    assert_eq!(stub.calls()[0].args, vec![Value::Int(7)]);
}

#[test]
fn test_list_return_type_is_reified() {
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("list", HttpVerb::Get, "/pets")
            .returns(TypeRef::list(TypeRef::class("app.Pet")))
            .build(),
    );
    let stub = ControllerStub::new(PETS).returning("list", Value::List(vec![]));
    let (machine, router) = install(&controller, &stub, Loader::new());

    let route = route(&router, "GET", "/pets");
    assert_eq!(
        route.return_type(),
        Some(Value::Reified {
            base: names::LIST.into(),
            args: vec![Value::Class("app.Pet".into())],
        })
    );
    assert_eq!(route.return_type().unwrap().to_string(), "util.List<app.Pet>");
    let result = machine
        .dispatch(route.handler(), &SyntheticContext::builder().build())
        .unwrap();
    assert_eq!(result, Value::List(vec![]));
}

#[test]
fn test_nested_parameterized_return_type() {
    let ty = TypeRef::generic(
        names::MAP,
        vec![TypeRef::string(), TypeRef::list(TypeRef::array(TypeRef::int()))],
    );
    let controller = ControllerDescriptor::new(PETS)
        .with_method(method("index", HttpVerb::Get, "/index").returns(ty).build());
    let stub = ControllerStub::new(PETS);
    let (_, router) = install(&controller, &stub, Loader::new());
    assert_eq!(
        route(&router, "GET", "/index").return_type().unwrap().to_string(),
        "util.Map<lang.String, util.List<[I>>"
    );
}

fn delete_controller() -> ControllerDescriptor {
    ControllerDescriptor::new(PETS).with_method(
        method("delete", HttpVerb::Delete, "/pets/{id}")
            .param(ParamDescriptor::path("id", TypeRef::long()))
            .build(),
    )
}

#[test]
fn test_void_sends_no_content_when_response_untouched() {
    let stub = ControllerStub::new(PETS).returning("delete", Value::Null);
    let (machine, router) = install(&delete_controller(), &stub, Loader::new());
    let route = route(&router, "DELETE", "/pets/{id}");
    assert_eq!(route.return_type(), Some(Value::Class(names::CONTEXT.into())));

    let ctx = SyntheticContext::builder().path("id", "9").build();
    let result = machine.dispatch(route.handler(), &ctx).unwrap();
    assert!(ctx.is_same(&result));
    assert_eq!(ctx.sent_statuses(), vec![NO_CONTENT]);
    assert_eq!(stub.calls()[0].args, vec![Value::Long(9)]);
}

#[test]
fn test_void_forwards_context_when_response_started() {
    let stub = ControllerStub::new(PETS).returning("delete", Value::Null);
    let (machine, router) = install(&delete_controller(), &stub, Loader::new());
    let route = route(&router, "DELETE", "/pets/{id}");

    let ctx = SyntheticContext::builder().path("id", "9").build();
    ctx.start_response();
    let result = machine.dispatch(route.handler(), &ctx).unwrap();
    assert!(ctx.is_same(&result));
    assert!(ctx.sent_statuses().is_empty());
}

#[test]
fn test_primitive_result_is_boxed() {
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("count", HttpVerb::Get, "/pets/count")
            .returns(TypeRef::int())
            .build(),
    );
    let stub = ControllerStub::new(PETS).returning("count", Value::Int(42));
    let (machine, router) = install(&controller, &stub, Loader::new());
    let route = route(&router, "GET", "/pets/count");
    assert_eq!(route.return_type(), Some(Value::Class("lang.Integer".into())));
    let result = machine
        .dispatch(route.handler(), &SyntheticContext::builder().build())
        .unwrap();
    assert_eq!(result, Value::boxed_int(42));
}

#[test]
fn test_status_code_result_is_sent() {
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("create", HttpVerb::Post, "/pets")
            .param(ParamDescriptor::body("pet", TypeRef::class("app.Pet")))
            .returns(TypeRef::class(names::STATUS_CODE))
            .consumes("application/json")
            .build(),
    );
    let stub = ControllerStub::new(PETS).returning("create", Value::StatusCode(201));
    let (machine, router) = install(&controller, &stub, Loader::new());
    let route = route(&router, "POST", "/pets");
    assert_eq!(route.consumes(), vec!["application/json".to_string()]);
    assert!(route.produces().is_empty());

    let pet = Value::record("app.Pet", [("name", Value::str("Rex"))]);
    let ctx = SyntheticContext::builder().body_object(pet.clone()).build();
    let result = machine.dispatch(route.handler(), &ctx).unwrap();
    assert!(ctx.is_same(&result));
    assert_eq!(ctx.sent_statuses(), vec![201]);
    assert_eq!(stub.calls()[0].args, vec![pet]);
}

#[test]
fn test_same_route_different_params_get_distinct_units() {
    let controller = ControllerDescriptor::new(PETS)
        .with_method(
            method("search", HttpVerb::Get, "/pets")
                .param(ParamDescriptor::query("q", TypeRef::string()))
                .returns(TypeRef::string())
                .build(),
        )
        .with_method(
            method("searchPaged", HttpVerb::Get, "/pets")
                .param(ParamDescriptor::query("q", TypeRef::string()))
                .param(ParamDescriptor::query("page", TypeRef::int()))
                .returns(TypeRef::string())
                .build(),
        );
    let compiled = compile(&controller);
    assert_ne!(compiled.handlers[0].name, compiled.handlers[1].name);

    let stub = ControllerStub::new(PETS)
        .returning("search", Value::str("one"))
        .returning("searchPaged", Value::str("two"));
    let (machine, router) = install(&controller, &stub, Loader::new());
    let routes = router.routes();
    assert_eq!(routes.len(), 2);
    let ctx = SyntheticContext::builder().query("q", "x").query("page", "2").build();
    assert_eq!(machine.dispatch(routes[0].handler(), &ctx).unwrap(), Value::str("one"));
    assert_eq!(machine.dispatch(routes[1].handler(), &ctx).unwrap(), Value::str("two"));
    assert_eq!(
        stub.calls()[1].args,
        vec![Value::str("x"), Value::Int(2)]
    );
}

#[test]
fn test_duplicate_route_fails_compilation() {
    let controller = ControllerDescriptor::new(PETS)
        .with_method(method("a", HttpVerb::Get, "/pets").build())
        .with_method(method("b", HttpVerb::Get, "/pets/").build());
    assert!(matches!(
        RouteCompiler::default().compile_controller(&controller),
        Err(CompileError::DuplicateRoute { .. })
    ));
}

#[test]
fn test_attribute_filtering() {
    let controller = ControllerDescriptor::new(PETS)
        .with_method(
            method("plain", HttpVerb::Get, "/plain")
                .attribute("ws.rs.GET", AttributeValue::Boolean(true))
                .attribute("ws.rs.QueryParam", "q")
                .attribute("annotation.Nullable", AttributeValue::Boolean(true))
                .build(),
        )
        .with_method(
            method("secured", HttpVerb::Get, "/secured")
                .attribute(
                    "app.Roles",
                    AttributeValue::map([(
                        "value",
                        AttributeValue::List(vec!["admin".into(), "ops".into()]),
                    )]),
                )
                .attribute(
                    "app.Marker",
                    AttributeValue::map([("NotNull", AttributeValue::Boolean(true))]),
                )
                .attribute("app.Level", AttributeValue::enum_constant("app.Level", "HIGH"))
                .attribute("app.Timeout", AttributeValue::Long(30_000))
                .build(),
        );
    let stub = ControllerStub::new(PETS);
    let (_, router) = install(&controller, &stub, Loader::new());

    assert!(route(&router, "GET", "/plain").attributes().is_empty());

    let secured = route(&router, "GET", "/secured");
    let names: Vec<String> = secured.attributes().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, ["app.Roles", "app.Level", "app.Timeout"]);
    assert_eq!(
        secured.attribute("app.Roles"),
        Some(Value::Map(vec![(
            Value::str("value"),
            Value::List(vec![Value::str("admin"), Value::str("ops")]),
        )]))
    );
    assert_eq!(
        secured.attribute("app.Level"),
        Some(Value::Enum {
            ty: "app.Level".into(),
            constant: "HIGH".into(),
        })
    );
    assert_eq!(
        secured.attribute("app.Timeout"),
        Some(Value::Boxed(PrimitiveKind::Long, Box::new(Value::Long(30_000))))
    );
}

#[test]
fn test_value_bindings() {
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("find", HttpVerb::Get, "/pets/{kind}")
            .param(ParamDescriptor::path("kind", TypeRef::class("app.Kind")))
            .param(ParamDescriptor::query("tags", TypeRef::set(TypeRef::string())))
            .param(ParamDescriptor::query("ids", TypeRef::list(TypeRef::class("lang.Integer"))))
            .param(ParamDescriptor::query("sort", TypeRef::optional(TypeRef::string())))
            .param(ParamDescriptor::header("X-Trace", TypeRef::string()).nullable())
            .param(ParamDescriptor::cookie("session", TypeRef::string()).with_source("sid"))
            .param(ParamDescriptor::form("active", TypeRef::boolean()))
            .returns(TypeRef::string())
            .build(),
    );
    let stub = ControllerStub::new(PETS).returning("find", Value::str("ok"));
    let (machine, router) = install(&controller, &stub, Loader::new());

    let ctx = SyntheticContext::builder()
        .path("kind", "dog")
        .query("tags", "a")
        .query("tags", "a")
        .query("ids", "1")
        .query("ids", "2")
        .cookie("sid", "s-1")
        .form("active", "true")
        .build();
    machine
        .dispatch(route(&router, "GET", "/pets/{kind}").handler(), &ctx)
        .unwrap();
    assert_eq!(
        stub.calls()[0].args,
        vec![
            Value::record("app.Kind", [("value", Value::str("dog"))]),
            Value::Set(vec![Value::str("a")]),
            Value::List(vec![Value::boxed_int(1), Value::boxed_int(2)]),
            Value::Optional(None),
            Value::Null,
            Value::str("s-1"),
            Value::Int(1),
        ]
    );
}

#[test]
fn test_missing_required_value_fails_dispatch() {
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("get", HttpVerb::Get, "/pets/{id}")
            .param(ParamDescriptor::path("id", TypeRef::int()))
            .build(),
    );
    let stub = ControllerStub::new(PETS).returning("get", Value::Null);
    let (machine, router) = install(&controller, &stub, Loader::new());
    let err = machine
        .dispatch(
            route(&router, "GET", "/pets/{id}").handler(),
            &SyntheticContext::builder().build(),
        )
        .unwrap_err();
    assert_eq!(err, daedalus_test::TestError::Missing("path `id`".into()));
    assert!(stub.calls().is_empty());
}

#[test]
fn test_body_and_upload_bindings() {
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("upload", HttpVerb::Post, "/pets/{id}/photos")
            .param(ParamDescriptor::body("raw", TypeRef::byte_array()))
            .param(ParamDescriptor::upload("photo", TypeRef::class(names::FILE_UPLOAD)))
            .param(ParamDescriptor::upload(
                "extra",
                TypeRef::list(TypeRef::class(names::FILE_UPLOAD)),
            ))
            .param(
                ParamDescriptor::upload("photoPath", TypeRef::class(names::FILE_PATH))
                    .with_source("photo"),
            )
            .param(ParamDescriptor::upload("thumb", TypeRef::byte_array()))
            .build(),
    );
    let stub = ControllerStub::new(PETS).returning("upload", Value::Null);
    let (machine, router) = install(&controller, &stub, Loader::new());

    let ctx = SyntheticContext::builder()
        .body(b"raw-bytes".to_vec())
        .file("photo", "rex.png", b"png".to_vec())
        .file("extra", "a.txt", b"a".to_vec())
        .file("extra", "b.txt", b"b".to_vec())
        .file("thumb", "t.png", b"t".to_vec())
        .build();
    machine
        .dispatch(route(&router, "POST", "/pets/{id}/photos").handler(), &ctx)
        .unwrap();

    let args = &stub.calls()[0].args;
    assert_eq!(args[0], Value::Bytes(b"raw-bytes".to_vec()));
    assert_eq!(
        args[1].downcast_native::<daedalus_test::UploadedFile>().unwrap().file_name,
        "rex.png"
    );
    let Value::List(extra) = &args[2] else {
        panic!("expected a list, got {}", args[2]);
    };
    assert_eq!(extra.len(), 2);
    assert_eq!(
        args[3],
        Value::record(names::FILE_PATH, [("name", Value::str("rex.png"))])
    );
    assert_eq!(args[4], Value::Bytes(b"t".to_vec()));
}

#[test]
fn test_context_and_bound_bindings() {
    let filters = MethodRef::new("app.Filters", "parse");
    let controller = ControllerDescriptor::new(PETS).with_method(
        method("search", HttpVerb::Get, "/search")
            .param(ParamDescriptor::context("ctx", TypeRef::context()))
            .param(ParamDescriptor::context("session", TypeRef::class("app.Session")))
            .param(ParamDescriptor::context(
                "user",
                TypeRef::optional(TypeRef::class("app.User")),
            ))
            .param(ParamDescriptor::context("budget", TypeRef::long()))
            .param(ParamDescriptor::bound("filter", TypeRef::class("app.Filter"), Some(filters)))
            .param(ParamDescriptor::bound("page", TypeRef::class("app.Page"), None))
            .param(ParamDescriptor::body("limit", TypeRef::int()))
            .build(),
    );
    let stub = ControllerStub::new(PETS).returning("search", Value::Null);
    let loader = Loader::new().with_static("app.Filters", "parse", |args| {
        assert_eq!(args.len(), 1);
        Ok(Value::record("app.Filter", [("q", Value::str("all"))]))
    });
    let (machine, router) = install(&controller, &stub, loader);

    let session = Value::record("app.Session", [("id", Value::str("s"))]);
    let user = Value::record("app.User", [("name", Value::str("ann"))]);
    let page = Value::record("app.Page", [("n", Value::Int(1))]);
    let ctx = SyntheticContext::builder()
        .value("app.Session", session.clone())
        .value("app.User", user.clone())
        .value("lang.Long", Value::Boxed(PrimitiveKind::Long, Box::new(Value::Long(5))))
        .bound("app.Page", page.clone())
        .body("25")
        .build();
    machine
        .dispatch(route(&router, "GET", "/search").handler(), &ctx)
        .unwrap();

    let args = &stub.calls()[0].args;
    assert!(ctx.is_same(&args[0]));
    assert_eq!(args[1], session);
    assert_eq!(args[2], Value::Optional(Some(Box::new(user))));
    assert_eq!(args[3], Value::Long(5));
    assert_eq!(args[4], Value::record("app.Filter", [("q", Value::str("all"))]));
    assert_eq!(args[5], page);
    assert_eq!(args[6], Value::Int(25));
}

#[test]
fn test_every_unit_verifies_after_decoding() {
    let controller = ControllerDescriptor::new(PETS)
        .with_method(
            method("a", HttpVerb::Put, "/a/{x}")
                .param(ParamDescriptor::path("x", TypeRef::primitive(PrimitiveKind::Double)))
                .returns(TypeRef::primitive(PrimitiveKind::Char))
                .produces("text/plain")
                .build(),
        )
        .with_method(
            method("b", HttpVerb::Patch, "/b")
                .param(ParamDescriptor::body("items", TypeRef::list(TypeRef::class("app.Item"))))
                .returns(TypeRef::context())
                .build(),
        );
    let compiled = compile(&controller);
    let machine = link(&compiled, Loader::new());
    assert_eq!(
        machine.unit_names(daedalus_unit::UnitKind::Registration),
        vec!["app.PetController$Routes"]
    );
    assert_eq!(machine.unit_names(daedalus_unit::UnitKind::Handler).len(), 2);
}
