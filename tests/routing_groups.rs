// Route groups: pattern composition, scoping and late middleware
#[cfg(test)]
mod test {
    use http::StatusCode;
    use switchyard::{
        App, Environment, Error, HandlerArgs, Request, Response, Settings, from_fn, handler_fn,
    };

    fn ok(_req: &Request, _res: &mut Response, _args: &HandlerArgs) -> switchyard::Result<()> {
        Ok(())
    }

    fn patterns(app: &App) -> Vec<String> {
        app.router().routes().iter().map(|route| route.pattern()).collect()
    }

    #[test]
    fn test_patterns_are_concatenated_verbatim() {
        let app = App::new(Settings::default()).unwrap();
        app.group("/", |app: &App| {
            app.get("/bar", handler_fn(ok));
            Ok(())
        })
        .unwrap();
        app.group("", |app: &App| {
            app.get("", handler_fn(ok));
            Ok(())
        })
        .unwrap();
        app.group("/foo", |app: &App| {
            app.get("bar", handler_fn(ok));
            Ok(())
        })
        .unwrap();

        assert_eq!(patterns(&app), vec!["//bar", "", "/foobar"]);
    }

    #[test]
    fn test_nested_groups() {
        let app = App::new(Settings::default()).unwrap();
        app.group("/foo", |app: &App| {
            app.group("/baz", |app: &App| {
                app.get("/bar", handler_fn(ok));
                Ok(())
            })?;
            app.get("/qux", handler_fn(ok));
            Ok(())
        })
        .unwrap();
        app.get("/top", handler_fn(ok));

        assert_eq!(patterns(&app), vec!["/foo/baz/bar", "/foo/qux", "/top"]);
        assert!(app.router().open_groups().is_empty());
    }

    #[test]
    fn test_group_closes_when_body_fails() {
        let app = App::new(Settings::default()).unwrap();
        let result = app.group("/broken", |app: &App| {
            app.get("/first", handler_fn(ok));
            Err(Error::application("registration failed"))
        });
        assert!(result.is_err());

        app.get("/after", handler_fn(ok));
        assert_eq!(patterns(&app), vec!["/broken/first", "/after"]);
        assert!(app.router().open_groups().is_empty());
    }

    #[test]
    fn test_routes_keep_their_groups() {
        let app = App::new(Settings::default()).unwrap();
        app.group("/outer", |app: &App| {
            app.group("/inner", |app: &App| {
                app.get("/leaf", handler_fn(ok));
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();

        let routes = app.router().routes();
        let groups: Vec<&str> = routes[0].groups().iter().map(|g| g.pattern()).collect();
        assert_eq!(groups, vec!["/outer", "/inner"]);
    }

    #[test]
    fn test_group_middleware_added_after_registration_applies() {
        let app = App::new(Settings::default())
            .unwrap()
            .with_environment(Environment::mock([("REQUEST_URI", "/admin/users")]));
        let group = app
            .group("/admin", |app: &App| {
                app.get(
                    "/users",
                    handler_fn(|_req: &Request, res: &mut Response, _args: &HandlerArgs| {
                        res.write("users");
                        Ok(())
                    }),
                );
                Ok(())
            })
            .unwrap();
        group.add(from_fn(|req, res, next| {
            let mut res = next.run(req, res)?;
            res.write("+audited");
            Ok(res)
        }));

        let response = app.run(None).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().contents(), "users+audited");
    }

    #[test]
    fn test_group_routes_dispatch_with_placeholders() {
        let app = App::new(Settings::default())
            .unwrap()
            .with_environment(Environment::mock([("REQUEST_URI", "/users/42/posts")]));
        app.group("/users/{id:[0-9]+}", |app: &App| {
            app.get(
                "/posts",
                handler_fn(|_req: &Request, _res: &mut Response, args: &HandlerArgs| {
                    Ok(format!("posts of {}", args.get("id").unwrap_or_default()))
                }),
            );
            Ok(())
        })
        .unwrap();

        let response = app.run(None).unwrap();
        assert_eq!(response.body().contents(), "posts of 42");
    }

    #[test]
    fn test_optional_segments_in_group() {
        let app = App::new(Settings::default()).unwrap();
        app.group("/archive", |app: &App| {
            app.get(
                "[/{year}[/{month}]]",
                handler_fn(|_req: &Request, _res: &mut Response, args: &HandlerArgs| {
                    Ok(format!(
                        "{}-{}",
                        args.get("year").unwrap_or("all"),
                        args.get("month").unwrap_or("all")
                    ))
                }),
            )
            .set_name("archive");
            Ok(())
        })
        .unwrap();

        let uri = |path: &str| {
            Request::from_environment(&Environment::mock([("REQUEST_URI", path.to_string())]))
        };
        let body = |path: &str| {
            app.process(uri(path), app.response_template())
                .unwrap()
                .body()
                .contents()
        };
        assert_eq!(body("/archive"), "all-all");
        assert_eq!(body("/archive/2024"), "2024-all");
        assert_eq!(body("/archive/2024/05"), "2024-05");

        let path = app
            .router()
            .path_for("archive", &[("year", "2024")], &[])
            .unwrap();
        assert_eq!(path, "/archive/2024");
    }
}
