//! Built-in checks for the portfolio landing page

use crate::assertion::Assertion;
use crate::spec::{Check, Locator, Subject, Suite, Viewport};

pub const PORTFOLIO_INTRO: &str =
    "Projetos onde apliquei qualidade orientada ao negócio e automação estratégica:";

pub const LINKEDIN_URL: &str = "https://www.linkedin.com/in/josepachecoqa/";

/// Load budget for the landing page, in milliseconds
pub const LOAD_BUDGET_MS: u64 = 3000;

/// Every suite of the landing-page catalog, in reporting order
pub fn landing_page() -> Vec<Suite> {
    vec![
        navigation(),
        hero(),
        about(),
        services(),
        responsiveness(),
        accessibility(),
        load_performance(),
        click_through(),
    ]
}

fn css(selector: &str) -> Locator {
    Locator::css(selector)
}

fn navigation() -> Suite {
    let nav_link = |text: &str| Locator::contains("a", text).within(css(".nav-menu"));

    Suite::new("Navigation")
        .tag("smoke")
        .check(
            Check::new("displays the navbar")
                .expect(css(".navbar"), Assertion::Visible)
                .expect(css(".navbar-logo"), Assertion::text_contains("José Pacheco")),
        )
        .check(
            Check::new("has every navigation link")
                .expect(nav_link("Sobre"), Assertion::attribute_equals("href", "#sobre"))
                .expect(nav_link("Serviços"), Assertion::attribute_equals("href", "#servicos"))
                .expect(nav_link("Diferenciais"), Assertion::attribute_equals("href", "#diferenciais"))
                .expect(nav_link("Portfólio"), Assertion::attribute_equals("href", "#portfolio"))
                .expect(nav_link("Conversar"), Assertion::attribute_equals("href", "#contato")),
        )
        .check(
            Check::new("navigates to a section when its link is clicked")
                .click(Locator::contains("a", "Sobre"))
                .expect(css("#sobre"), Assertion::Visible)
                .expect(css(".sobre-text"), Assertion::text_contains("Sou QA Engineer")),
        )
}

fn hero() -> Suite {
    Suite::new("Hero")
        .tag("smoke")
        .check(
            Check::new("displays the hero with title and subtitle")
                .expect(css(".hero"), Assertion::Visible)
                .expect(
                    css(".hero-title"),
                    Assertion::text_contains("QA focado em qualidade orientada ao negócio"),
                )
                .expect(css(".hero-subtitle"), Assertion::Visible),
        )
        .check(
            Check::new("has a profile image")
                .expect(
                    css(".profile-image"),
                    Assertion::attribute_equals("alt", "José Pacheco - QA Engineer"),
                )
                .expect(css(".profile-image"), Assertion::Visible),
        )
        .check(
            Check::new("has call-to-action buttons")
                .expect(
                    Locator::contains("a", "Ver Portfólio").within(css(".hero-cta")),
                    Assertion::Visible,
                )
                .expect(
                    Locator::contains("a", "Começar conversa").within(css(".hero-cta")),
                    Assertion::Visible,
                ),
        )
}

fn about() -> Suite {
    let stat = |text: &str| Locator::text(text).within(css("#sobre .sobre-stats"));

    Suite::new("About")
        .check(
            Check::new("displays the about section")
                .expect(css("#sobre"), Assertion::Visible)
                .expect(css("#sobre .section-title"), Assertion::text_contains("Sobre mim")),
        )
        .check(
            Check::new("displays experience stats")
                .expect(stat("4+"), Assertion::Visible)
                .expect(stat("Anos em QA"), Assertion::Visible)
                .expect(stat("8+"), Assertion::Visible)
                .expect(stat("Projetos"), Assertion::Visible),
        )
        .check(
            Check::new("has professional description paragraphs").expect(
                css("p").within(css("#sobre .sobre-text")),
                Assertion::length_greater_than(0),
            ),
        )
}

fn services() -> Suite {
    Suite::new("Services")
        .check(
            Check::new("displays the services section")
                .expect(css("#servicos"), Assertion::Visible)
                .expect(css("#servicos .section-title"), Assertion::text_contains("O que eu faço")),
        )
        .check(
            Check::new("displays service cards").expect(
                css(".servico-card").within(css(".servicos-grid")),
                Assertion::length_greater_than(0),
            ),
        )
        .check(
            Check::new("displays an icon in the first service card").expect(
                css(".servico-icon").within(css(".servico-card").first()),
                Assertion::Visible,
            ),
        )
}

fn responsiveness() -> Suite {
    Suite::new("Responsiveness")
        .check(
            Check::new("is responsive on mobile")
                .viewport(Viewport::new(375, 812))
                .expect(css(".navbar"), Assertion::Visible)
                .expect(css(".hero-title"), Assertion::Visible),
        )
        .check(
            Check::new("is responsive on tablet")
                .viewport(Viewport::new(768, 1024))
                .expect(css(".navbar"), Assertion::Visible)
                .expect(css(".hero"), Assertion::Visible),
        )
        .check(
            Check::new("is responsive on desktop")
                .viewport(Viewport::new(1920, 1080))
                .expect(css(".navbar"), Assertion::Visible)
                .expect(css(".hero"), Assertion::Visible),
        )
}

fn accessibility() -> Suite {
    Suite::new("Accessibility")
        .tag("smoke")
        .check(
            Check::new("has a proper title")
                .expect(Subject::Title, Assertion::text_contains("José Pacheco")),
        )
        .check(
            Check::new("has a meta description").expect(
                css(r#"meta[name="description"]"#),
                Assertion::attribute_present("content"),
            ),
        )
        .check(
            Check::new("has a viewport meta tag").expect(
                css(r#"meta[name="viewport"]"#),
                Assertion::attribute_present("content"),
            ),
        )
        .check(
            Check::new("declares the page language")
                .expect(css("html"), Assertion::attribute_equals("lang", "pt-BR")),
        )
}

fn load_performance() -> Suite {
    Suite::new("Load Performance")
        .check(
            Check::new("loads the page within 3 seconds")
                .visit("/", Some(LOAD_BUDGET_MS))
                .expect(css(".hero"), Assertion::Visible),
        )
        .check(
            Check::new("displays every image")
                .expect_each(css("img"), Assertion::css_not_equal("display", "none")),
        )
}

fn click_through() -> Suite {
    Suite::new("Click-through Interactions")
        .check(
            Check::new("\"Ver Portfólio\" button navigates to the portfolio")
                .click(Locator::contains("a", "Ver Portfólio"))
                .expect(css("#portfolio"), Assertion::Visible)
                .expect(css(".portfolio-intro"), Assertion::text_equals(PORTFOLIO_INTRO)),
        )
        .check(
            Check::new("\"Começar conversa\" button navigates to contact")
                .click(Locator::contains("a", "Começar conversa"))
                .expect(css("a.contato-link"), Assertion::attribute_equals("href", LINKEDIN_URL)),
        )
}
