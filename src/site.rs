//! DOM selectors and link texts for the PeopleAdmin postings site.

// Session
pub const LOGGED_IN_MARKERS: [&str; 2] = ["Logout", "Welcome"];
pub const LOGIN_LINK_TEXTS: [&str; 2] = ["Log In /Create Account", "Log In"];
pub const USERNAME_INPUT: &str = "input[id='user_username'], input[name='user[username]']";
pub const PASSWORD_INPUT: &str = "input[id='user_password'], input[name='user[password]']";
pub const LOGIN_SUBMIT: &str = "input[value='Log In'], button[type='submit'], input[type='submit']";

// Search
pub const POSTED_WITHIN_SELECT: &str = "select#query_v0_posted_at_date";
pub const SEARCH_SUBMIT: &str = "input[type='submit'][value='Search'], button[type='submit']";
pub const SEARCH_LINK_TEXT: &str = "Search Jobs";

// Posting page
pub const APPLY_LINK_TEXTS: [&str; 2] = ["Apply for this Job", "Apply to this Job"];
pub const APPLY_BUTTON: &str = "a.btn-apply";
pub const CLOSED_MARKERS: [&str; 4] = [
    "archived",
    "no longer accepting applications",
    "posting has closed",
    "position has been filled",
];

// Application form
pub const FIRST_NAME_INPUT: &str = "input[name*='first_name']";
pub const LAST_NAME_INPUT: &str = "input[name*='last_name']";
pub const EMAIL_INPUT: &str = "input[name*='email']";
pub const PHONE_INPUT: &str = "input[name*='phone']";
pub const ADDRESS_INPUT: &str = "input[name*='address']";
pub const CITY_INPUT: &str = "input[name*='city']";
pub const ZIP_INPUT: &str = "input[name*='zip']";

pub const ADD_EDUCATION: &str = "Add Educational History Entry";
pub const ADD_EMPLOYMENT: &str = "Add Employment History Entry";
pub const ADD_REFERENCE: &str = "Add References Entry";
pub const SAVE_ENTRY: &str = "input[value='Save'], button.save";
pub const SAVE_ENTRY_TEXT: &str = "Save";

pub const EDU_SCHOOL: &str = "input[id*='SchoolName']";
pub const EDU_MAJOR: &str = "input[id*='Major']";
pub const EDU_GRADUATED: &str = "select[id*='Graduated']";
pub const EDU_DEGREE: &str = "input[id*='Degree']";

pub const EMP_EMPLOYER: &str = "input[id*='EmployerName']";
pub const EMP_PHONE: &str = "input[id*='Phone']";
pub const EMP_ADDRESS: &str = "input[id*='Address']";
pub const EMP_CITY: &str = "input[id*='City']";
pub const EMP_TITLE: &str = "input[id*='Title']";
pub const EMP_DUTIES: &str = "textarea[id*='Duties']";
pub const EMP_SUPERVISOR: &str = "input[id*='SupervisorName']";
pub const EMP_REASON: &str = "input[id*='ReasonForLeaving']";
pub const EMP_BEGIN: &str = "input[id*='BeginDate']";
pub const EMP_END: &str = "input[id*='EndDate']";

pub const REF_NAME: &str = "input[id*='Name']";
pub const REF_EMAIL: &str = "input[id*='Email']";
pub const REF_PHONE: &str = "input[id*='Phone']";
pub const REF_RELATIONSHIP: &str = "textarea[id*='Relationship']";

pub const RESUME_ROW_LABEL: &str = "Resume";
pub const COVER_LETTER_ROW_LABEL: &str = "Cover Letter";
pub const ANY_FILE_INPUT: &str = "input[type='file']";

pub const EEO_GENDER: &str = "select[id*='gender']";
pub const EEO_ETHNICITY: &str = "select[id*='ethnicity']";
pub const EEO_RACE: &str = "select[id*='race']";
pub const EEO_VETERAN: &str = "select[id*='veteran']";
pub const EEO_DISABILITY: &str = "select[id*='disability']";

pub const FINAL_SUBMIT: &str = "input[type='submit'][value='Submit Application'], input[value='Submit']";
pub const FINAL_SUBMIT_TEXT: &str = "Submit Application";
