use log::{debug, info};

use crate::config::Config;
use crate::contact::ContactForm;
use crate::controller::Controller;
use crate::dom::{Dom, Event, EventOutcome};
use crate::download::DownloadFeedback;
use crate::experience::ExperienceLoader;
use crate::header::HeaderEffects;
use crate::menu::MenuController;

/// Every controller on the page, owned here and nowhere else. Dropping the
/// page without [`Page::teardown`] leaves listeners registered on the host.
pub struct Page {
    pub download: DownloadFeedback,
    pub contact: ContactForm,
    pub experience: ExperienceLoader,
    pub menu: MenuController,
    pub header: HeaderEffects,
}

impl Page {
    /// Bind each controller to its anchor. Controllers whose anchor is missing
    /// stay inert; the rest work regardless.
    pub fn mount(dom: &mut dyn Dom, config: Config) -> Self {
        let Config {
            selectors,
            download,
            contact,
            experience,
            header,
        } = config;

        let page = Page {
            download: DownloadFeedback::attach(
                dom,
                &selectors.download_button,
                &selectors.download_feedback,
                download,
            ),
            contact: ContactForm::attach(dom, &selectors.contact_form, contact),
            experience: ExperienceLoader::attach(dom, &selectors.experience_list, experience),
            menu: MenuController::attach(dom, &selectors.menu_toggle, &selectors.menu_panel),
            header: HeaderEffects::attach(
                dom,
                &selectors.header,
                selectors.contrast_target.as_deref(),
                header,
            ),
        };

        let active: Vec<&str> = page
            .controllers()
            .iter()
            .filter(|c| c.is_active())
            .map(|c| c.name())
            .collect();
        info!("Page mounted: {}", active.join(", "));
        page
    }

    fn controllers(&self) -> [&dyn Controller; 5] {
        [
            &self.download,
            &self.contact,
            &self.experience,
            &self.menu,
            &self.header,
        ]
    }

    fn controllers_mut(&mut self) -> [&mut dyn Controller; 5] {
        [
            &mut self.download,
            &mut self.contact,
            &mut self.experience,
            &mut self.menu,
            &mut self.header,
        ]
    }

    /// Offer `event` to every controller. Outcomes are merged, so one
    /// controller asking to prevent the default action is enough.
    pub fn handle(&mut self, dom: &mut dyn Dom, event: &Event) -> EventOutcome {
        let mut outcome = EventOutcome::IGNORED;
        for controller in self.controllers_mut() {
            outcome = outcome.merge(controller.handle(dom, event));
        }
        if !outcome.handled {
            debug!("Unclaimed event: {:?}", event);
        }
        outcome
    }

    /// Remove every listener, timer and observer the controllers added.
    pub fn teardown(mut self, dom: &mut dyn Dom) {
        for controller in self.controllers_mut() {
            controller.teardown(dom);
        }
        info!("Page torn down");
    }
}
