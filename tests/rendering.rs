//! Integration tests for the rendering engine: chaining, indentation,
//! outdent scoping, and full-script assembly.

mod common;

use common::TestEnv;
use serde_json::json;
use shellforge::RecipeError;

#[test]
fn chained_statements_render_as_one_pipeline() {
    let env = TestEnv::new();
    let mut recipe = env.recipe("install.sh");

    recipe
        .execute("cat access.log")
        .unwrap()
        .execute("grep ' 500 '")
        .unwrap()
        .execute("wc -l")
        .unwrap()
        .redirect_to("errors.count")
        .unwrap();

    let text = env.rendered(&mut recipe);
    assert_eq!(
        text,
        "cat access.log | grep ' 500 ' | wc -l > errors.count\nstatus_check $?\n"
    );
    assert_eq!(text.matches("status_check").count(), 1);
}

#[test]
fn branches_chain_across_indent_levels() {
    let env = TestEnv::new();
    let mut recipe = env.recipe("install.sh");

    recipe
        .when("[ -x /usr/bin/systemctl ]", |r| {
            r.execute("systemctl enable app").map(|_| ())
        })
        .unwrap()
        .otherwise(|r| {
            r.comment("sysvinit fallback")?;
            r.execute("update-rc.d app defaults").map(|_| ())
        })
        .unwrap();

    assert_eq!(
        env.rendered(&mut recipe),
        "if [ -x /usr/bin/systemctl ]; then\n\
         \x20\x20systemctl enable app\n\
         \x20\x20status_check $?\n\
         else\n\
         \x20\x20# sysvinit fallback\n\
         \x20\x20update-rc.d app defaults\n\
         \x20\x20status_check $?\n\
         fi\n"
    );
}

#[test]
fn outdent_renders_heredoc_content_flat() {
    let env = TestEnv::new();
    let mut recipe = env.recipe("install.sh");

    // Heredoc bodies and the terminator must not inherit the
    // surrounding indentation.
    recipe
        .when("[ ! -f /etc/app.conf ]", |r| {
            r.writeln("cat > /etc/app.conf <<'EOF'")?;
            r.outdent(|r| {
                r.writeln("workers = 4")?;
                r.writeln("log = /var/log/app.log")?;
                r.writeln("EOF")
            })
        })
        .unwrap();

    assert_eq!(
        env.rendered(&mut recipe),
        "if [ ! -f /etc/app.conf ]; then\n\
         \x20\x20cat > /etc/app.conf <<'EOF'\n\
         workers = 4\n\
         log = /var/log/app.log\n\
         EOF\n\
         fi\n"
    );
}

#[test]
fn outdent_nested_in_two_levels_subtracts_both() {
    let env = TestEnv::new();
    let mut recipe = env.recipe("install.sh");

    recipe.writeln("a").unwrap();
    recipe
        .indent_with("+", |r| {
            r.writeln("b")?;
            r.outdent(|r| {
                r.writeln("c")?;
                r.indent_with("-", |r| r.writeln("x"))
            })
        })
        .unwrap();

    assert_eq!(env.rendered(&mut recipe), "a\n+b\nc\n-x\n");
}

#[test]
fn errors_inside_nested_blocks_leave_a_usable_recipe() {
    let env = TestEnv::new();
    let mut recipe = env.recipe("install.sh");

    let result = recipe.when("true", |r| {
        r.indent(|r| {
            r.writeln("doomed")?;
            Err(RecipeError::ChainMisuse { op: "boom" })
        })
    });
    assert!(result.is_err());

    // The failed construct is partially rendered, but the buffer slot and
    // indent stack are restored, so rendering can continue.
    recipe.execute("echo recovered").unwrap();
    let text = env.rendered(&mut recipe);
    assert!(text.ends_with("echo recovered\nstatus_check $?\n"));
}

#[test]
fn full_script_assembly() {
    let env = TestEnv::new();
    env.seed("files/app.conf", "workers = 4\n");
    env.seed(
        "templates/motd.tmpl",
        "Welcome to {{ host.name }} ({{ host.role }})\n",
    );
    env.seed(
        "attributes/defaults.toml",
        "[host]\nname = \"unnamed\"\nrole = \"worker\"\n",
    );

    let mut recipe = env.recipe("install.sh");
    recipe.set_attr("host.name", json!("node-1"));
    recipe.attributes("defaults").unwrap();

    recipe.preamble().unwrap();
    let conf = recipe.file("app.conf").unwrap();
    let motd = recipe.template("motd", &json!({})).unwrap();
    recipe.comment("install configuration").unwrap();
    recipe
        .execute(&format!("cp {conf} /etc/app.conf"))
        .unwrap();
    recipe.execute(&format!("cp {motd} /etc/motd")).unwrap();
    let text = env.rendered(&mut recipe);

    assert!(text.starts_with("#!/bin/sh\n"));
    assert!(text.contains("# install configuration\n"));
    assert!(text.contains("cp files/app.conf /etc/app.conf\nstatus_check $?\n"));
    assert!(text.contains("cp files/motd /etc/motd\nstatus_check $?\n"));

    // Attribute precedence: recipe-local value wins, file fills the rest.
    let pkg = env.package.borrow();
    assert_eq!(
        pkg.content("files/motd", None, None).unwrap(),
        Some("Welcome to node-1 (worker)\n".to_string())
    );
}

#[test]
fn child_recipes_render_into_their_own_targets() {
    let env = TestEnv::new();
    let mut parent = env.recipe("install.sh");
    parent.execute("sh scripts/db.sh").unwrap();

    let mut child = parent.spawn("scripts/db.sh").unwrap();
    child.preamble().unwrap();
    child.execute("createdb app").unwrap();
    child.close().unwrap();

    let text = env.rendered(&mut parent);
    assert_eq!(text, "sh scripts/db.sh\nstatus_check $?\n");

    let pkg = env.package.borrow();
    let child_text = pkg.content("scripts/db.sh", None, None).unwrap().unwrap();
    assert!(child_text.contains("createdb app\nstatus_check $?\n"));
}

#[test]
fn capture_feeds_rewritten_output() {
    let env = TestEnv::new();
    let mut recipe = env.recipe("install.sh");

    let block = recipe
        .capture(|r| {
            r.execute("uname -r").map(|_| ())
        })
        .unwrap();

    assert_eq!(block, "uname -r\nstatus_check $?\n");
    assert_eq!(env.rendered(&mut recipe), "");
}
