use minijinja::{context, Environment, Error, ErrorKind};

use crate::s2_analyzer::view::ClassView;

/// Template function aborting the rendering with `msg`.
pub fn panic(msg: &str) -> Result<String, Error> {
    Err(Error::new(ErrorKind::InvalidOperation, msg.to_string()))
}

pub fn warn(msg: &str) -> String {
    log::warn!("{msg}");
    String::new()
}

/// Renders `template_txt` with the instantiated class bound to `class`.
pub fn render(class: &ClassView, template_txt: &str) -> anyhow::Result<String> {
    let mut env = Environment::new();
    env.add_function("panic", panic);
    env.add_function("warn", warn);
    env.add_template("template", template_txt)?;
    let tmpl = env.get_template("template")?;
    Ok(tmpl.render(context!(class => class))?)
}

pub fn generate(class: &ClassView, template_file: &str) -> anyhow::Result<String> {
    log::debug!("generating {} with {template_file}", class.name);
    let template_txt = std::fs::read_to_string(template_file)?;
    render(class, &template_txt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s2_analyzer::scope::{NamedElement, Reference, ScopeId};
    use crate::s2_analyzer::Context;

    fn view(code: &str, name: &str) -> ClassView {
        let mut cx = Context::new();
        cx.open_document("test.mo", code);
        let class = cx
            .resolve(ScopeId::Context, &Reference::parse(name), false)
            .and_then(NamedElement::class)
            .expect("class not found");
        ClassView::new(&mut cx, class)
    }

    #[test]
    fn test_render_components() {
        let class = view(
            "model M parameter Real k = 2; Integer n = 3; end M;",
            "M",
        );
        let txt = render(
            &class,
            "{{ class.name }}:{% for c in class.components %} {{ c.name }}={{ c.value }}{% endfor %}",
        )
        .expect("render failed");
        assert_eq!(txt, "M: k=2.0 n=3");
    }

    #[test]
    fn test_panic_function_fails_render() {
        let class = view("model M end M;", "M");
        let err = render(&class, "{{ panic(\"unsupported\") }}").expect_err("render should fail");
        assert!(format!("{err:#}").contains("unsupported"));
        assert_eq!(
            render(&class, "{{ warn(\"careful\") }}ok").expect("render failed"),
            "ok"
        );
    }
}
