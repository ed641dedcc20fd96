#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::core::tags::{Element, ElementProvider};
    use crate::data::MemoryTemplateSource;
    use crate::listener::{ListenerEvent, SceneBuffer};
    use crate::registry::ActionContainer;
    use crate::{ParsedTemplate, Parser, ParserError, Syntax, Tag, TemplateData, TemplateRegistry, TemplateValue, Widget};

    fn init() {
        let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::Trace).try_init();
    }

    fn strict() -> Parser {
        Parser::builder().strict(true).build()
    }

    fn lenient() -> Parser {
        Parser::builder().strict(false).build()
    }

    fn text_of(template: &str) -> String {
        strict().parse_template(template).unwrap().text
    }

    fn element(tag: &dyn Tag) -> &Element {
        tag.widget().and_then(|widget| widget.as_any().downcast_ref::<Element>()).unwrap()
    }

    fn element_by_id<'a>(parsed: &'a ParsedTemplate, id: &str) -> &'a Element {
        element(parsed.find_by_id(id).unwrap())
    }

    #[test]
    fn test_literal_text() {
        init();

        let parsed = strict().parse_template("Hello, world! No tags here.").unwrap();
        assert_eq!(parsed.text, "Hello, world! No tags here.");
        assert!(parsed.nodes.is_empty());
    }

    #[test]
    fn test_tag_tree() {
        init();

        let parsed = strict()
            .parse_template(r#"<element id=root><element id=child text="Label"/>Body</element>"#)
            .unwrap();
        assert_eq!(parsed.nodes.len(), 1);
        let root = parsed.nodes[0].as_ref();
        assert_eq!(root.children().len(), 1);
        assert_eq!(element(root).text(), Some("Body"));
        assert_eq!(element_by_id(&parsed, "child").text(), Some("Label"));
    }

    #[test]
    fn test_closing_tag_case() {
        init();

        let error = strict().parse_template("<element></ELEMENT>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::TagMismatch { expected, found } if expected == "element" && found == "ELEMENT"));

        let parsed = lenient().parse_template("<element></ELEMENT>").unwrap();
        assert_eq!(parsed.nodes.len(), 1);

        let error = lenient().parse_template("<element></other>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::TagMismatch { found, .. } if found == "other"));
    }

    #[test]
    fn test_unknown_tags() {
        init();

        let error = strict().parse_template("<widget></widget>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::UnknownTag(name) if name == "widget"));

        let parsed = lenient().parse_template("<widget><element id=inner/></widget>").unwrap();
        assert_eq!(parsed.nodes.len(), 1);
        assert!(parsed.nodes[0].widget().is_none());
        assert!(parsed.find_by_id("inner").is_some());
    }

    #[test]
    fn test_unclosed_structures() {
        init();

        let error = strict().parse_template("line one\n<element>\nline three").unwrap_err();
        assert!(matches!(error.kind(), ParserError::UnclosedTag(name) if name == "element"));
        let diagnostics = error.diagnostics().unwrap();
        assert_eq!(diagnostics.original_name.as_deref(), Some("template"));
        assert_eq!(diagnostics.original_line, Some(3));

        let error = strict().parse_template("<:if test=true>never closed").unwrap_err();
        assert!(matches!(error.kind(), ParserError::UnclosedMacro(name) if name == "if"));

        let error = strict().parse_template("<!-- open").unwrap_err();
        assert!(matches!(error.kind(), ParserError::UnclosedComment));

        let error = strict().parse_template("</element>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::ClosingWithoutParent(_)));
    }

    #[test]
    fn test_comments() {
        init();

        assert_eq!(text_of("<!DOCTYPE lml><!-- a <!-- b --> c -->text"), "text");

        let mut flat = Parser::builder().nested_comments(false).build();
        let parsed = flat.parse_template("<!-- a <!-- b --> c -->").unwrap();
        assert_eq!(parsed.text, " c -->");
    }

    #[test]
    fn test_recursive_arguments() {
        init();

        let mut data = TemplateData::new();
        data.add_argument("greeting", "Hello {name}").add_argument("name", "{first}").add_argument("first", "Ann");
        let mut parser = Parser::builder().data(data).build();

        let parsed = parser.parse_template("{greeting}! {missing}").unwrap();
        assert_eq!(parsed.text, "Hello Ann! null");
    }

    #[test]
    fn test_equation_arguments() {
        init();

        let mut data = TemplateData::new();
        data.add_argument("count", 3);
        let mut parser = Parser::builder().data(data).build();

        assert_eq!(parser.parse_template("{=2 * 21}").unwrap().text, "42");
        assert_eq!(parser.parse_template("{=(1 + 2) * {count}}").unwrap().text, "9");
        assert_eq!(parser.parse_template("{?{count} == 3 ? three : other}").unwrap().text, "three");
        assert_eq!(parser.parse_template("{?{count} == 4 ? four}").unwrap().text, "");
        assert_eq!(parser.parse_template("{?Text = text}").unwrap().text, "true");
    }

    #[test]
    fn test_conditionals() {
        init();

        assert_eq!(text_of("before<:if test=false>hidden</:if>after"), "beforeafter");
        assert_eq!(text_of("<:if test=false>yes<:if:else/>no</:if>"), "no");
        assert_eq!(text_of("<:if 2 == 2>yes<:if:else/>no</:if>"), "yes");
        assert_eq!(
            text_of(r#"<:if test="true">a<:if test="false">b<:if:else/>c</:if>d<:if:else/>e</:if>"#),
            "acd"
        );

        let error = strict().parse_template("<:if>body</:if>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::InvalidAttributes { .. }));
    }

    #[test]
    fn test_null_checks() {
        init();

        let mut data = TemplateData::new();
        data.add_argument("name", "Bob");
        let mut parser = Parser::builder().data(data).build();

        let template = "<:notNull {name} {missing}>set<:notNull:else/>unset</:notNull>";
        assert_eq!(parser.parse_template(template).unwrap().text, "unset");
        let template = "<:anyNotNull {name} {missing}>set<:anyNotNull:else/>unset</:anyNotNull>";
        assert_eq!(parser.parse_template(template).unwrap().text, "set");
        let template = "<:isNull {missing}>missing</:isNull>";
        assert_eq!(parser.parse_template(template).unwrap().text, "missing");
    }

    #[test]
    fn test_loops() {
        init();

        assert_eq!(text_of("<:loop times=3>x{loop:index} </:loop>"), "x0 x1 x2 ");
        assert_eq!(text_of("<:loop 0>never</:loop>"), "");
        // The outer loop substitutes its index before the inner macro runs
        assert_eq!(
            text_of(r#"<:loop times=2><:each i="a;b">{loop:index}{i}</:each>;</:loop>"#),
            "0a0b;1a1b;"
        );
    }

    #[test]
    fn test_for_each() {
        init();

        assert_eq!(
            text_of(r#"<:forEach a="1;2;3" b="x">{a}{b}{forEach:index} </:forEach>"#),
            "1x0 2null1 3null2 "
        );
        assert_eq!(text_of(r#"<:each i="item[1,3]">{i} </:each>"#), "item1 item2 item3 ");
        assert_eq!(text_of(r#"<:each i="[3,1]">{i}</:each>"#), "321");
        assert_eq!(
            text_of(r#"<:nestedForEach a="1;2" b="x;y">{a}{b}{nestedForEach:index} </:nestedForEach>"#),
            "1x0 1y1 2x2 2y3 "
        );
        assert_eq!(text_of(r#"<:nestedForEach a="1;2" b="">{a}</:nestedForEach>"#), "");

        let error = strict().parse_template(r#"<:each i="a[x,2]">{i}</:each>"#).unwrap_err();
        assert!(matches!(error.kind(), ParserError::InvalidRange(_)));
    }

    #[test]
    fn test_while() {
        init();

        let counter = Arc::new(AtomicUsize::new(0));
        let registry = TemplateRegistry::with_defaults();
        let next = Arc::clone(&counter);
        registry
            .register_action("next", move |_| Ok(TemplateValue::from(next.fetch_add(1, Ordering::SeqCst) as i64)))
            .unwrap();
        let mut parser = Parser::builder().registry(Arc::new(registry)).build();

        let parsed = parser.parse_template(r#"<:while test="$next < 3">w{while:index}</:while>"#).unwrap();
        assert_eq!(parsed.text, "w0w1w2");
        assert_eq!(counter.load(Ordering::SeqCst), 4);

        assert_eq!(
            parser.parse_template(r#"<:while test="true" limit=4>a</:while>"#).unwrap().text,
            "aaaa"
        );
    }

    #[test]
    fn test_assignments() {
        init();

        assert_eq!(text_of("<:assign name=World/>Hello {name}<:loop times=2>!</:loop>"), "Hello World!!");
        assert_eq!(text_of("<:assign greeting>Hi {who}</:assign><:assign who Ann/>{greeting}"), "Hi Ann");
        assert_eq!(text_of("<:calculate total=\"2 * 21\"/>{total}"), "42");
        assert_eq!(text_of("<:argument key=copy value=\"{=1 + 1}\"/>{copy}"), "2");

        let picked = text_of(r#"<:random pick="a;b;c"/>{pick}"#);
        assert!(["a", "b", "c"].contains(&picked.as_str()));
    }

    #[test]
    fn test_definitions() {
        init();

        let mut parser = strict();
        let template = r#"<:macro name="greet" params="who">Hi {who}!</:macro><:greet who=Bob/>"#;
        assert_eq!(parser.parse_template(template).unwrap().text, "Hi Bob!");

        // Definitions outlive the template that declared them
        assert_eq!(parser.parse_template("<:greet Ann/>").unwrap().text, "Hi Ann!");

        let template = "<:macro shout text>{text}!!</:macro><:shout>hey</:shout>";
        assert_eq!(parser.parse_template(template).unwrap().text, "hey!!");

        let template = r#"<:newTag name="card" params="title"><element id="{title}"/></:newTag><card title=main/>"#;
        let parsed = parser.parse_template(template).unwrap();
        assert!(parsed.find_by_id("main").is_some());

        let template = r#"<:newAttribute name="primary">id={primary} color=blue</:newAttribute><element primary=save/>"#;
        let parsed = parser.parse_template(template).unwrap();
        assert_eq!(element_by_id(&parsed, "save").attribute("color"), Some("blue"));
    }

    #[test]
    fn test_imports() {
        init();

        let mut source = MemoryTemplateSource::new();
        source
            .insert("header", "<element id=header>{title}</element>")
            .insert("frame", "[{content}]");
        let mut data = TemplateData::new();
        data.set_source(Box::new(source));
        let mut parser = Parser::builder().data(data).build();

        let parsed = parser.parse_template("<:assign title=Main/><:import header/>").unwrap();
        assert_eq!(element_by_id(&parsed, "header").text(), Some("Main"));

        let parsed = parser.parse_template("<:import path=frame replace=content>inner</:import>").unwrap();
        assert_eq!(parsed.text, "[inner]");

        let error = parser.parse_template("<:import missing/>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::Import { path, .. } if path == "missing"));
    }

    #[test]
    fn test_actions() {
        init();

        let registry = TemplateRegistry::with_defaults();
        registry.register_action("greeting", |_| Ok(TemplateValue::from("hello"))).unwrap();
        registry
            .register_action("upper", |argument: Option<&str>| {
                Ok(TemplateValue::from(argument.unwrap_or_default().to_uppercase()))
            })
            .unwrap();
        registry
            .register_action("colors", |_| Ok(TemplateValue::from(vec!["red", "green"])))
            .unwrap();
        registry
            .register_container("user", ActionContainer::new().with("name", |_| Ok(TemplateValue::from("Ann"))))
            .unwrap();
        let mut parser = Parser::builder().registry(Arc::new(registry)).build();

        assert_eq!(parser.parse_template("{$greeting}, {$user.name}").unwrap().text, "hello, Ann");
        assert_eq!(parser.parse_template("<:evaluate action=$upper argument=abc/>").unwrap().text, "ABC");
        assert_eq!(
            parser.parse_template("<:evaluate action=$upper key=loud>quiet</:evaluate>{loud}").unwrap().text,
            "QUIET"
        );
        assert_eq!(
            parser.parse_template(r#"<:each c="$colors;white">{c} </:each>"#).unwrap().text,
            "red green white "
        );

        let error = parser.parse_template("{$unknown}").unwrap_err();
        assert!(matches!(error.kind(), ParserError::UnknownAction(name) if name == "unknown"));
    }

    #[test]
    fn test_bundles_and_preferences() {
        init();

        let mut data = TemplateData::new();
        data.add_default_bundle(HashMap::from([("hello".to_string(), "Hello".to_string())]))
            .add_bundle("fr", HashMap::from([("hello".to_string(), "Bonjour".to_string())]))
            .add_default_preferences(HashMap::from([("volume".to_string(), "7".to_string())]));
        let mut parser = Parser::builder().data(data).build();

        let parsed = parser.parse_template("{@hello} {@fr.hello} {#volume} {@nope}").unwrap();
        assert_eq!(parsed.text, "Hello Bonjour 7 null");
    }

    #[test]
    fn test_booleans() {
        init();

        let error = strict().parse_boolean("yes").unwrap_err();
        assert!(matches!(error, ParserError::InvalidBoolean(value) if value == "yes"));
        assert!(!lenient().parse_boolean("yes").unwrap());
        assert!(strict().parse_boolean("true").unwrap());
    }

    #[test]
    fn test_listeners() {
        init();

        let mut parser = strict();
        let template = "<element id=button><:onClick cache=true>clicked {count}</:onClick></element>";
        let mut parsed = parser.parse_template(template).unwrap();
        parser.data_mut().add_argument("count", 1);

        let button = parsed.find_by_id_mut("button").unwrap();
        let button = button.widget_mut().unwrap().as_any_mut().downcast_mut::<Element>().unwrap();
        assert_eq!(button.listeners().len(), 1);

        let mut scene = SceneBuffer::default();
        assert_eq!(button.fire(ListenerEvent::Click, &mut parser, &mut scene).unwrap(), 1);
        parser.data_mut().add_argument("count", 2);
        assert_eq!(button.fire(ListenerEvent::Change, &mut parser, &mut scene).unwrap(), 0);
        button.fire(ListenerEvent::Click, &mut parser, &mut scene).unwrap();
        assert_eq!(scene.merged.len(), 2);
        assert_eq!(scene.merged[0].text, "clicked 1");
        // Cached: the second firing replays the first result
        assert_eq!(scene.merged[1].text, "clicked 1");

        assert_eq!(button.remove_listeners(ListenerEvent::Change), 0);
        assert_eq!(button.remove_listeners(ListenerEvent::Click), 1);
        assert!(button.listeners().is_empty());
        assert_eq!(button.fire(ListenerEvent::Click, &mut parser, &mut scene).unwrap(), 0);
        assert_eq!(scene.merged.len(), 2);
    }

    #[test]
    fn test_listener_conditions() {
        use std::sync::atomic::AtomicBool;

        init();

        // Arguments in the condition are resolved while the tag is read, so
        // state that changes later has to come from an action
        let enabled = Arc::new(AtomicBool::new(false));
        let registry = TemplateRegistry::with_defaults();
        let flag = Arc::clone(&enabled);
        registry
            .register_action("enabled", move |_| Ok(TemplateValue::from(flag.load(Ordering::SeqCst))))
            .unwrap();
        let mut parser = Parser::builder().registry(Arc::new(registry)).build();

        let template = "<element id=field><:onInput if=$enabled>typed</:onInput></element>";
        let mut parsed = parser.parse_template(template).unwrap();
        let field = parsed.find_by_id_mut("field").unwrap();
        let field = field.widget_mut().unwrap().as_any_mut().downcast_mut::<Element>().unwrap();

        let mut scene = SceneBuffer::default();
        assert_eq!(field.fire(ListenerEvent::Input, &mut parser, &mut scene).unwrap(), 0);
        enabled.store(true, Ordering::SeqCst);
        assert_eq!(field.fire(ListenerEvent::Input, &mut parser, &mut scene).unwrap(), 1);
        assert_eq!(scene.merged[0].text, "typed");
    }

    #[test]
    fn test_leaf_widgets() {
        init();

        let registry = Arc::new(TemplateRegistry::with_defaults());
        registry.register_tag("label", ElementProvider::new().leaf()).unwrap();
        let template = "<label id=caption><element id=inner/></label>";

        let mut parser = Parser::builder().strict(true).registry(Arc::clone(&registry)).build();
        let error = parser.parse_template(template).unwrap_err();
        assert!(matches!(error.kind(), ParserError::NotAParent(name) if name == "label"));

        let mut parser = Parser::builder().strict(false).registry(registry).build();
        let parsed = parser.parse_template(template).unwrap();
        assert_eq!(parsed.find_by_id("caption").unwrap().children().len(), 1);
        assert!(!element_by_id(&parsed, "caption").is_container());
    }

    #[test]
    fn test_custom_syntax() {
        init();

        let syntax = Syntax {
            tag_opening: '⟨',
            tag_closing: '⟩',
            macro_marker: '%',
            argument_opening: '«',
            argument_closing: '»',
            ..Syntax::default()
        };
        let mut data = TemplateData::new();
        data.add_argument("my-count", 3);
        let mut parser = Parser::builder().syntax(syntax).data(data).build();

        let template = "«=(«my-count») + 1» ⟨%loop times=2⟩x«loop%index»⟨/%loop⟩⟨element id=box text=«my-count»/⟩";
        let parsed = parser.parse_template(template).unwrap();
        assert_eq!(parsed.text, "4 x0x1");
        assert_eq!(element_by_id(&parsed, "box").text(), Some("3"));

        // Default markers are plain text now
        let parsed = parser.parse_template("<element> {my-count}").unwrap();
        assert_eq!(parsed.text, "<element> {my-count}");
    }

    #[test]
    fn test_listeners_by_id() {
        init();

        let mut parser = strict();
        let parsed = parser
            .parse_template(r#"<:onClick ids="save;cancel">clicked</:onClick><element id=save/><element id=cancel/>"#)
            .unwrap();
        assert_eq!(element_by_id(&parsed, "save").listeners().len(), 1);
        assert_eq!(element_by_id(&parsed, "cancel").listeners().len(), 1);

        // Without keep the attacher is gone after one template
        let parsed = parser.parse_template("<element id=save/>").unwrap();
        assert!(element_by_id(&parsed, "save").listeners().is_empty());

        parser.parse_template(r#"<:onChange ids=save keep=true>changed</:onChange>"#).unwrap();
        let parsed = parser.parse_template("<element id=save/>").unwrap();
        assert_eq!(element_by_id(&parsed, "save").listeners().len(), 1);
    }

    #[test]
    fn test_listener_without_target() {
        init();

        let error = strict().parse_template("<:onClick>orphan</:onClick>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::InvalidAttributes { .. }));
        assert!(lenient().parse_template("<:onClick>orphan</:onClick>").is_ok());
    }

    #[test]
    fn test_fragments_keep_parse_state() {
        init();

        let mut parser = strict();
        let fragment = parser.parse_fragment("<element id=inner/>tail", "fragment").unwrap();
        assert_eq!(fragment.nodes.len(), 1);
        assert_eq!(fragment.text, "tail");

        let parsed = parser.parse_template("<element id=outer/>").unwrap();
        assert!(parsed.find_by_id("inner").is_none());
        assert!(parsed.find_by_id("outer").is_some());
    }

    #[test]
    fn test_misc_macros() {
        init();

        assert_eq!(text_of("a<:comment>ignored <b></:comment>b"), "ab");
        assert_eq!(text_of("<:comment><:comment>x</:comment>y<:comment/></:comment>z"), "z");
        assert_eq!(text_of("<:logInfo>Loaded {count} items</:logInfo>done"), "done");

        let error = strict().parse_template(r#"<:exception message="boom {reason}"/>"#).unwrap_err();
        assert!(matches!(error.kind(), ParserError::Custom(message) if message == "boom null"));

        let error = strict().parse_template("<:unknownMacro/>").unwrap_err();
        assert!(matches!(error.kind(), ParserError::UnknownMacro(_)));
        assert_eq!(lenient().parse_template("<:unknownMacro/>rest").unwrap().text, "rest");
    }
}
