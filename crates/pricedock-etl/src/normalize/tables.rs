// Built-in lookup data for city canonicalization and region assignment

/// Placeholder city for stores whose source city is blank
pub const UNKNOWN_CITY: &str = "לא ידוע";

/// Region for cities absent from [`REGIONS`]
pub const DEFAULT_REGION: &str = "לא מוגדר";

/// Spelling-variant prefixes rewritten to their canonical form
pub const PREFIX_REWRITES: &[(&str, &str)] = &[("קרית ", "קריית ")];

/// Known misspellings and aliases mapped to the canonical city name
pub const CITY_OVERRIDES: &[(&str, &str)] = &[
    (r#"ת"א"#, "תל אביב"),
    ("תלאביב", "תל אביב"),
    ("תל אביב - יפו", "תל אביב"),
    ("תל אביב-יפו", "תל אביב"),
    ("רמת אביב א", "תל אביב"),
    ("י-ם", "ירושלים"),
    ("ירושלם", "ירושלים"),
    ("ים", "ירושלים"),
    (r#"ראשל"צ"#, "ראשון לציון"),
    ("ראשוןלציון", "ראשון לציון"),
    ("ראשון", "ראשון לציון"),
    ("באר-שבע", "באר שבע"),
    ("בארשבע", "באר שבע"),
    (r#"ב"ש"#, "באר שבע"),
    ("בית-שמש", "בית שמש"),
    ("ראש-פינה", "ראש פינה"),
    ("פתח-תקוה", "פתח תקווה"),
    ("פתח-תקווה", "פתח תקווה"),
    ("פתחתקוה", "פתח תקווה"),
    ("פתח תקוה", "פתח תקווה"),
    ("בני-ברק", "בני ברק"),
    ("כפר-סבא", "כפר סבא"),
    ("כפר סבא צפון", "כפר סבא"),
    ("רמת-גן", "רמת גן"),
    ("רמת-השרון", "רמת השרון"),
    ("מצפה-רמון", "מצפה רמון"),
    ("יוקנעם", "יקנעם עילית"),
    ("יקנעם", "יקנעם עילית"),
    ("טבעון", "קריית טבעון"),
    ("רעות", "מודיעין"),
    ("חצור-הגלילית", "חצור הגלילית"),
    ("בת-ים", "בת ים"),
    ("נס-ציונה", "נס ציונה"),
    ("נוף-הגליל", "נוף הגליל"),
    ("NaN", "לא ידוע"),
    ("nan", "לא ידוע"),
];

/// Canonical city name to region
pub const REGIONS: &[(&str, &str)] = &[
    ("אופקים", "דרום"),
    ("אור יהודה", "מרכז"),
    ("אור עקיבא", "שרון"),
    ("אילת", "דרום"),
    ("אלנקווה", "יהודה ושומרון"),
    ("אלעד", "מרכז"),
    ("אריאל", "יהודה ושומרון"),
    ("אשדוד", "דרום"),
    ("אשקלון", "דרום"),
    ("באר טוביה", "דרום"),
    ("באר יעקב", "מרכז"),
    ("באר שבע", "דרום"),
    ("בארות יצחק", "מרכז"),
    ("בית חשמונאי", "מרכז"),
    ("בית שאן", "צפון"),
    ("בית שמש", "ירושלים והסביבה"),
    ("ביתר עילית", "ירושלים והסביבה"),
    ("בני ברק", "מרכז"),
    ("בני דרור", "שרון"),
    ("בנימינה", "צפון"),
    ("בת חפר", "שרון"),
    ("בת ים", "מרכז"),
    ("גבעת אולגה", "צפון"),
    ("גבעת עדה", "צפון"),
    ("גבעת שמואל", "מרכז"),
    ("גבעתיים", "מרכז"),
    ("גדרה", "מרכז"),
    ("דימונה", "דרום"),
    ("דלית אל כרמל", "צפון"),
    ("הוד השרון", "שרון"),
    ("הרצליה", "שרון"),
    ("זכרון יעקב", "צפון"),
    ("חדרה", "צפון"),
    ("חולון", "מרכז"),
    ("חיפה", "צפון"),
    ("חצור הגלילית", "צפון"),
    ("חריש", "צפון"),
    ("טבריה", "צפון"),
    ("טייבה", "מרכז"),
    ("טירה", "מרכז"),
    ("טירת הכרמל", "צפון"),
    ("יבנה", "מרכז"),
    ("יהוד", "מרכז"),
    ("יקנעם עילית", "צפון"),
    ("ירוחם", "דרום"),
    ("ירושלים", "ירושלים והסביבה"),
    ("ירכא", "צפון"),
    ("כפר ורדים", "צפון"),
    ("כפר יונה", "שרון"),
    ("כפר נטר", "שרון"),
    ("כפר סבא", "שרון"),
    ("כפר קרע", "צפון"),
    ("כפר תבור", "צפון"),
    ("כרכור", "צפון"),
    ("כרמיאל", "צפון"),
    ("לא ידוע", "לא מוגדר"),
    ("מבשרת ציון", "ירושלים והסביבה"),
    ("מגדל העמק", "צפון"),
    ("מודיעין", "מרכז"),
    ("מודיעין עילית", "יהודה ושומרון"),
    ("מזכרת בתיה", "מרכז"),
    ("מיתר", "דרום"),
    ("מעלה אדומים", "יהודה ושומרון"),
    ("מעלות", "צפון"),
    ("מצפה רמון", "דרום"),
    ("משמר השרון", "שרון"),
    ("נהריה", "צפון"),
    ("נוף הגליל", "צפון"),
    ("נס ציונה", "מרכז"),
    ("נצרת", "צפון"),
    ("נשר", "צפון"),
    ("נתניה", "שרון"),
    ("סביון", "מרכז"),
    ("סכנין", "צפון"),
    ("עומר", "דרום"),
    ("עין שמר", "צפון"),
    ("עכו", "צפון"),
    ("עפולה", "צפון"),
    ("ערד", "דרום"),
    ("פרדס חנה", "צפון"),
    ("פרדסיה", "שרון"),
    ("פתח תקווה", "מרכז"),
    ("צור יגאל", "שרון"),
    ("צור משה", "שרון"),
    ("צורן", "שרון"),
    ("צפת", "צפון"),
    ("קדימה", "שרון"),
    ("קצרין", "צפון"),
    ("קריית אונו", "מרכז"),
    ("קריית אתא", "צפון"),
    ("קריית ביאליק", "צפון"),
    ("קריית גת", "דרום"),
    ("קריית חיים", "צפון"),
    ("קריית טבעון", "צפון"),
    ("קריית מוצקין", "צפון"),
    ("קריית ספר", "יהודה ושומרון"),
    ("קריית שמונה", "צפון"),
    ("ראש העין", "מרכז"),
    ("ראש פינה", "צפון"),
    ("ראשון לציון", "מרכז"),
    ("רהט", "דרום"),
    ("רחובות", "מרכז"),
    ("רכסים", "צפון"),
    ("רמלה", "מרכז"),
    ("רמת גן", "מרכז"),
    ("רמת השרון", "מרכז"),
    ("רעננה", "שרון"),
    ("שדרות", "דרום"),
    ("שוהם", "מרכז"),
    ("שילת", "מרכז"),
    ("שפרעם", "צפון"),
    ("תל אביב", "מרכז"),
    ("תל מונד", "שרון"),
];
