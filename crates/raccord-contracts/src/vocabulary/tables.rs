#[derive(Clone, Copy, Debug)]
pub(crate) struct BodyStateSpec {
    pub state: &'static str,
    pub terms: &'static [&'static str],
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct LocaleTables {
    pub pickup_verbs: &'static [&'static str],
    pub body_states: &'static [BodyStateSpec],
    pub unfixable_keywords: &'static [&'static str],
    /// Terms that are also common words in another supported language.
    /// They only apply when this locale is used on its own.
    pub homographs: &'static [&'static str],
}

/// Error types a prompt addendum can plausibly correct. These are model
/// output tokens, so they are shared by every locale.
pub(crate) const FIXABLE_ERROR_TYPES: &[&str] = &["prop", "lighting", "spatial", "position"];

pub(crate) const ENGLISH: LocaleTables = LocaleTables {
    pickup_verbs: &[
        "pick up",
        "picks up",
        "picked up",
        "picking up",
        "grab",
        "grabs",
        "grabbed",
        "grabbing",
        "take",
        "takes",
        "took",
        "taking",
        "seize",
        "seizes",
        "seized",
        "lift",
        "lifts",
        "lifted",
        "reach for",
        "reaches for",
        "reached for",
        "pull out",
        "pulls out",
        "pulled out",
        "draw",
        "draws",
        "drew",
        "catch",
        "catches",
        "caught",
        "handed",
    ],
    body_states: &[
        BodyStateSpec {
            state: "sitting",
            terms: &["sitting", "sits", "sit", "sat", "seated"],
        },
        BodyStateSpec {
            state: "standing",
            terms: &["standing", "stands", "stood", "stand up", "stands up"],
        },
        BodyStateSpec {
            state: "lying",
            terms: &["lying", "lies down", "lay down", "lying down", "laid out"],
        },
        BodyStateSpec {
            state: "running",
            terms: &["running", "runs", "ran", "sprinting", "sprints"],
        },
        BodyStateSpec {
            state: "walking",
            terms: &["walking", "walks", "walked", "strolling", "strolls"],
        },
    ],
    unfixable_keywords: &[
        "face",
        "faces",
        "facial",
        "identity",
        "different person",
        "another person",
        "wrong person",
        "different character",
        "different actor",
        "unrecognizable",
        "unrecognisable",
        "likeness",
    ],
    homographs: &[],
};

pub(crate) const FRENCH: LocaleTables = LocaleTables {
    pickup_verbs: &[
        "prend",
        "prennent",
        "prenant",
        "saisit",
        "saisissent",
        "saisissant",
        "attrape",
        "attrapent",
        "attrapant",
        "ramasse",
        "ramassent",
        "ramassant",
        "soulève",
        "sort",
        "dégaine",
        "brandit",
        "récupère",
    ],
    body_states: &[
        BodyStateSpec {
            state: "sitting",
            terms: &["assis", "assise", "assoit", "assied", "attablé", "attablée"],
        },
        BodyStateSpec {
            state: "standing",
            terms: &["debout", "se lève", "levé", "levée"],
        },
        BodyStateSpec {
            state: "lying",
            terms: &["allongé", "allongée", "couché", "couchée", "étendu", "étendue"],
        },
        BodyStateSpec {
            state: "running",
            terms: &["court", "courent", "courant", "en courant"],
        },
        BodyStateSpec {
            state: "walking",
            terms: &["marche", "marchent", "marchant", "se promène"],
        },
    ],
    unfixable_keywords: &[
        "visage",
        "visages",
        "identité",
        "personne différente",
        "autre personne",
        "mauvaise personne",
        "personnage différent",
        "méconnaissable",
        "ressemblance",
    ],
    homographs: &["sort", "court", "marche"],
};
