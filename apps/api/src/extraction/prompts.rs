// Structured-extraction prompt templates.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// Placeholders ({lender_name}, {applicant_name}, {raw_text}) are substituted
// with simple string replacement before the call.

pub const LENDER_EXTRACTION_SYSTEM: &str = "You are a financial document analysis expert \
    specialized in extracting structured information from loan policy documents. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

pub const LENDER_EXTRACTION_PROMPT: &str = r#"Analyze the following OCR-extracted text from a lender's policy document and extract structured information.

Lender Name: {lender_name}

Raw OCR Text:
{raw_text}

Extract and structure the following information in JSON format:
1. **Loan Types**: List of loan types offered (e.g., personal, home, auto, business)
2. **Interest Rates**: Interest rate ranges or specific rates mentioned
3. **Eligibility Criteria**: Requirements for loan applicants
4. **Loan Amount Range**: Minimum and maximum loan amounts
5. **Tenure**: Loan repayment period options
6. **Processing Fees**: Any fees or charges mentioned
7. **Documents Required**: List of documents needed for loan application
8. **Key Terms and Conditions**: Important T&Cs from the policy
9. **Contact Information**: Phone numbers, email, website, addresses
10. **Special Offers**: Any promotional offers or special schemes

Return ONLY a valid JSON object with these keys. If information is not found, use null for that field.
Ensure all extracted text is clean, properly formatted, and accurate.

Example output format:
{
    "loan_types": ["personal", "home"],
    "interest_rates": {"min": "10.5%", "max": "15.0%"},
    "eligibility_criteria": ["Age 21-65", "Minimum income Rs. 25,000"],
    "loan_amount_range": {"min": "Rs. 50,000", "max": "Rs. 20,00,000"},
    "tenure": {"min": "12 months", "max": "60 months"},
    "processing_fees": "2% of loan amount",
    "documents_required": ["PAN Card", "Aadhaar Card", "Bank Statements"],
    "key_terms": ["Prepayment allowed after 6 months", "No collateral required"],
    "contact_information": {
        "phone": "+91-XXXXXXXXXX",
        "email": "info@lender.com",
        "website": "www.lender.com"
    },
    "special_offers": ["0.5% discount on interest for salaried employees"]
}"#;

pub const APPLICATION_EXTRACTION_SYSTEM: &str = "You are a loan application analysis expert \
    specialized in extracting structured information from loan application documents. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

pub const APPLICATION_EXTRACTION_PROMPT: &str = r#"Analyze the following OCR-extracted text from a loan application and extract structured information.

Applicant Name: {applicant_name}

Raw OCR Text:
{raw_text}

Extract and structure the following information in JSON format:
1. **Loan Type**: Type of loan requested (e.g., personal, home, auto, business)
2. **Loan Amount**: Amount of loan requested
3. **Loan Purpose**: Purpose of the loan
4. **Tenure Requested**: Desired loan repayment period
5. **Employment Details**: Employment status, employer name, job title, years employed
6. **Income Details**: Monthly/annual income, other income sources
7. **Credit Score**: Credit score if mentioned
8. **Existing Loans**: Details of existing loans or debts
9. **Assets**: Property, vehicles, investments owned
10. **Personal Information**: Age, marital status, dependents, education
11. **Contact Information**: Phone, email, address
12. **Documents Provided**: List of documents submitted with application
13. **Special Requirements**: Any special conditions or requirements mentioned

Return ONLY a valid JSON object with these keys. If information is not found, use null for that field.
Ensure all extracted text is clean, properly formatted, and accurate.

Example output format:
{
    "loan_type": "home",
    "loan_amount": {"amount": 500000, "currency": "USD"},
    "loan_purpose": "Purchase primary residence",
    "tenure_requested": {"years": 30},
    "employment_details": {
        "status": "employed",
        "employer": "ABC Corp",
        "job_title": "Software Engineer",
        "years_employed": 5
    },
    "income_details": {
        "monthly_income": 8000,
        "annual_income": 96000,
        "other_income": null
    },
    "credit_score": 750,
    "existing_loans": [
        {"type": "auto", "balance": 15000, "monthly_payment": 350}
    ],
    "assets": {
        "property": [],
        "vehicles": [{"type": "car", "value": 25000}],
        "investments": {"stocks": 50000}
    },
    "personal_information": {
        "age": 35,
        "marital_status": "married",
        "dependents": 2,
        "education": "Bachelor's Degree"
    },
    "contact_information": {
        "phone": "+1-XXX-XXX-XXXX",
        "email": "applicant@email.com",
        "address": "123 Main St, City, State ZIP"
    },
    "documents_provided": ["Pay stubs", "Tax returns", "Bank statements"],
    "special_requirements": null
}"#;
